/// Actor store models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Wire rendering of a field with no known value
pub const UNKNOWN: &str = "unknown";

/// `last_update` layout; sorts lexicographically in time order
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// A cached actor
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub external_id: Option<i64>,
    pub country: Option<String>,
    pub birthday: Option<String>,
    pub deathday: Option<String>,
    pub gender: Option<String>,
    pub last_update: String,
}

/// Actor fields resolved from the directory, ready to insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewActor {
    pub name: String,
    pub external_id: Option<i64>,
    pub country: Option<String>,
    pub birthday: Option<String>,
    pub deathday: Option<String>,
    pub gender: Option<String>,
}

/// Partial update of an actor.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorChanges {
    pub name: Option<String>,
    pub country: Option<Option<String>>,
    pub birthday: Option<Option<String>>,
    pub deathday: Option<Option<String>>,
    pub gender: Option<Option<String>>,
    pub shows: Option<Vec<String>>,
}

impl Actor {
    /// Apply scalar changes in place. A new name drops the directory id,
    /// which belonged to the old name.
    pub fn apply(&mut self, changes: &ActorChanges, last_update: String) {
        if let Some(name) = &changes.name {
            if *name != self.name {
                self.name = name.clone();
                self.external_id = None;
            }
        }
        if let Some(country) = &changes.country {
            self.country = country.clone();
        }
        if let Some(birthday) = &changes.birthday {
            self.birthday = birthday.clone();
        }
        if let Some(deathday) = &changes.deathday {
            self.deathday = deathday.clone();
        }
        if let Some(gender) = &changes.gender {
            self.gender = gender.clone();
        }
        self.last_update = last_update;
    }
}

/// Identity key for an actor name: each run of non-letters becomes one
/// space, then lowercase and trim.
///
/// `"Brad_Pitt!"` and `"brad  pitt"` both map to `"brad pitt"`.
pub fn normalize_name(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if c.is_ascii_alphabetic() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(c.to_ascii_lowercase());
        } else {
            pending_space = true;
        }
    }

    key
}

/// Format a timestamp for the `last_update` column
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Render an optional field for responses
pub fn display_or_unknown(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.to_string())
}

/// Whether an incoming value is one of the unknown markers
pub fn is_unknown_marker(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) || trimmed.eq_ignore_ascii_case("null")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_actor() -> Actor {
        Actor {
            id: 5,
            name: "Jane Roe".to_string(),
            external_id: Some(1234),
            country: Some("Canada".to_string()),
            birthday: Some("1970-01-02".to_string()),
            deathday: None,
            gender: Some("Female".to_string()),
            last_update: "2022-03-01-10:00:00".to_string(),
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Brad_Pitt!"), "brad pitt");
        assert_eq!(normalize_name("  brad   pitt "), "brad pitt");
        assert_eq!(normalize_name("Robert Downey Jr."), "robert downey jr");
        assert_eq!(normalize_name("O'Brien"), "o brien");
        assert_eq!(normalize_name("1234"), "");
    }

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2022, 3, 21, 9, 5, 7).unwrap();
        assert_eq!(format_timestamp(at), "2022-03-21-09:05:07");
    }

    #[test]
    fn test_rename_drops_external_id() {
        let mut actor = sample_actor();
        let changes = ActorChanges {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        };

        actor.apply(&changes, "2022-03-02-00:00:00".to_string());

        assert_eq!(actor.name, "Jane Doe");
        assert_eq!(actor.external_id, None);
        assert_eq!(actor.last_update, "2022-03-02-00:00:00");
    }

    #[test]
    fn test_partial_change_keeps_other_fields() {
        let mut actor = sample_actor();
        let changes = ActorChanges {
            country: Some(None),
            deathday: Some(Some("2020-05-05".to_string())),
            ..Default::default()
        };

        actor.apply(&changes, "2022-03-02-00:00:00".to_string());

        assert_eq!(actor.external_id, Some(1234));
        assert_eq!(actor.country, None);
        assert_eq!(actor.deathday.as_deref(), Some("2020-05-05"));
        assert_eq!(actor.gender.as_deref(), Some("Female"));
    }

    #[test]
    fn test_unknown_markers() {
        assert!(is_unknown_marker("unknown"));
        assert!(is_unknown_marker("NULL"));
        assert!(is_unknown_marker(""));
        assert!(!is_unknown_marker("Male"));
        assert_eq!(display_or_unknown(&None), "unknown");
    }
}
