/// Reconciler - brings actors from the external directory into the store
use crate::{
    actor_store::{format_timestamp, normalize_name, ActorStore, NewActor},
    directory::{ActorDirectory, CastCredit, DirectoryPerson},
    error::{CastError, CastResult},
    metrics,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedActor {
    pub id: i64,
    pub last_update: String,
}

/// Merges directory records into the local store without duplicates
#[derive(Clone)]
pub struct Reconciler {
    store: ActorStore,
    directory: Arc<dyn ActorDirectory>,
}

impl Reconciler {
    pub fn new(store: ActorStore, directory: Arc<dyn ActorDirectory>) -> Self {
        Self { store, directory }
    }

    /// Look an actor up by name in the directory and cache it locally.
    ///
    /// One search call, then (only for a new actor) one credit call.
    pub async fn create_actor(&self, raw_name: &str) -> CastResult<CreatedActor> {
        let name_key = normalize_name(raw_name);
        if name_key.is_empty() {
            return Err(CastError::Validation(format!(
                "Actor name {:?} has no letters",
                raw_name
            )));
        }

        let people = self.directory.search(&name_key).await?;
        let person = match people.into_iter().next() {
            Some(person) if normalize_name(&person.name) == name_key => person,
            Some(person) => {
                debug!("Top directory match {:?} differs from {:?}", person.name, name_key);
                return Err(actor_missing(raw_name));
            }
            None => return Err(actor_missing(raw_name)),
        };

        if self.store.exists_by_name_key(&name_key).await? {
            return Err(CastError::AlreadyExists(format!(
                "Actor {} already exists",
                raw_name
            )));
        }

        let credits = self.directory.credits(person.id).await?;
        let shows = distinct_show_names(credits);
        let actor = to_new_actor(person);
        let last_update = format_timestamp(Utc::now());

        let id = self.store.insert(&actor, &shows, &last_update).await?;

        metrics::ACTORS_CREATED_TOTAL.inc();
        info!("Added actor {} ({}) with {} shows", id, actor.name, shows.len());

        Ok(CreatedActor { id, last_update })
    }
}

fn actor_missing(raw_name: &str) -> CastError {
    CastError::NotFound(format!("Actor {} does not exist", raw_name))
}

/// Map a directory person onto store fields, dropping blanks
fn to_new_actor(person: DirectoryPerson) -> NewActor {
    NewActor {
        name: person.name,
        external_id: Some(person.id),
        country: non_blank(person.country.map(|country| country.name)),
        birthday: non_blank(person.birthday),
        deathday: non_blank(person.deathday),
        gender: non_blank(person.gender),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Show names in first-seen order, each once
fn distinct_show_names(credits: Vec<CastCredit>) -> Vec<String> {
    let mut seen = HashSet::new();
    credits
        .into_iter()
        .map(|credit| credit.show.name)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{db, directory::NamedRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory directory that counts calls
    #[derive(Default)]
    pub(crate) struct StubDirectory {
        pub people: Vec<DirectoryPerson>,
        pub shows: Vec<String>,
        pub searches: AtomicUsize,
        pub credit_lookups: AtomicUsize,
    }

    #[async_trait]
    impl ActorDirectory for StubDirectory {
        async fn search(&self, _name: &str) -> CastResult<Vec<DirectoryPerson>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self.people.clone())
        }

        async fn credits(&self, _external_id: i64) -> CastResult<Vec<CastCredit>> {
            self.credit_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .shows
                .iter()
                .map(|name| CastCredit {
                    show: NamedRef { name: name.clone() },
                })
                .collect())
        }
    }

    fn brad_pitt() -> DirectoryPerson {
        DirectoryPerson {
            id: 5,
            name: "Brad Pitt".to_string(),
            country: Some(NamedRef {
                name: "United States".to_string(),
            }),
            birthday: Some("1963-12-18".to_string()),
            deathday: None,
            gender: None,
        }
    }

    async fn setup(directory: StubDirectory) -> (Reconciler, ActorStore, Arc<StubDirectory>) {
        let store = ActorStore::new(db::create_memory_pool().await.unwrap());
        let directory = Arc::new(directory);
        let reconciler = Reconciler::new(store.clone(), directory.clone());
        (reconciler, store, directory)
    }

    #[tokio::test]
    async fn test_create_actor_round_trip() {
        let (reconciler, store, directory) = setup(StubDirectory {
            people: vec![brad_pitt()],
            shows: vec!["Friends".into(), "Friends".into(), "Glee".into()],
            ..Default::default()
        })
        .await;

        let created = reconciler.create_actor("brad_pitt").await.unwrap();

        let actor = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(actor.name, "Brad Pitt");
        assert_eq!(actor.external_id, Some(5));
        assert_eq!(actor.country.as_deref(), Some("United States"));
        assert_eq!(actor.gender, None);
        assert_eq!(actor.last_update, created.last_update);
        assert_eq!(store.shows(created.id).await.unwrap(), vec!["Friends", "Glee"]);

        assert_eq!(directory.searches.load(Ordering::SeqCst), 1);
        assert_eq!(directory.credit_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_not_found() {
        let (reconciler, store, directory) = setup(StubDirectory::default()).await;

        let err = reconciler.create_actor("john doe").await.unwrap_err();

        assert!(matches!(err, CastError::NotFound(_)));
        assert!(store.is_empty().await.unwrap());
        assert_eq!(directory.credit_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fuzzy_top_match_is_not_found() {
        let mut near_miss = brad_pitt();
        near_miss.name = "Brad Pittman".to_string();
        let (reconciler, store, _) = setup(StubDirectory {
            people: vec![near_miss, brad_pitt()],
            ..Default::default()
        })
        .await;

        let err = reconciler.create_actor("Brad Pitt").await.unwrap_err();

        assert!(matches!(err, CastError::NotFound(_)));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_repeat_create_is_already_exists() {
        let (reconciler, store, directory) = setup(StubDirectory {
            people: vec![brad_pitt()],
            shows: vec!["Friends".into()],
            ..Default::default()
        })
        .await;

        let first = reconciler.create_actor("Brad Pitt").await.unwrap();
        let before = store.get(first.id).await.unwrap();

        for _ in 0..3 {
            let err = reconciler.create_actor("BRAD PITT").await.unwrap_err();
            assert!(matches!(err, CastError::AlreadyExists(_)));
        }

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(first.id).await.unwrap(), before);
        // Existing actors never trigger a credit lookup
        assert_eq!(directory.credit_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_name_without_letters_is_rejected() {
        let (reconciler, _, directory) = setup(StubDirectory::default()).await;

        let err = reconciler.create_actor("1234!").await.unwrap_err();

        assert!(matches!(err, CastError::Validation(_)));
        assert_eq!(directory.searches.load(Ordering::SeqCst), 0);
    }
}
