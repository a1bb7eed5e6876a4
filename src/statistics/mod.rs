/// Statistics engine
///
/// Distribution of the stored actors over a few categorical attributes,
/// as JSON percentages or as a row of pie charts.

pub mod chart;

use crate::{
    actor_store::{format_timestamp, ActorStore},
    error::{CastError, CastResult},
    metrics,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use chart::{ChartRenderer, PieChart, PieChartRenderer, PieSlice};

/// Label for actors with no value for an attribute
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Output format of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFormat {
    Json,
    Image,
}

impl StatsFormat {
    pub fn from_str(s: &str) -> CastResult<Self> {
        match s {
            "json" => Ok(StatsFormat::Json),
            "image" => Ok(StatsFormat::Image),
            _ => Err(CastError::Validation(format!("Format {} is invalid", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsFormat::Json => "json",
            StatsFormat::Image => "image",
        }
    }
}

/// Attributes a summary can break down by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Country,
    Birthday,
    Gender,
    LifeStatus,
}

impl Attribute {
    pub fn from_str(s: &str) -> CastResult<Self> {
        match s {
            "country" => Ok(Attribute::Country),
            "birthday" => Ok(Attribute::Birthday),
            "gender" => Ok(Attribute::Gender),
            "life_status" => Ok(Attribute::LifeStatus),
            _ => Err(CastError::Validation(format!(
                "Filtering attribute {} is invalid",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Country => "country",
            Attribute::Birthday => "birthday",
            Attribute::Gender => "gender",
            Attribute::LifeStatus => "life_status",
        }
    }

    /// Grouping expression over the actor table; NULL means unknown
    fn category_expression(&self) -> &'static str {
        match self {
            Attribute::Country => "country",
            Attribute::Gender => "gender",
            Attribute::Birthday => "substr(birthday, 1, 4)",
            Attribute::LifeStatus => {
                "CASE WHEN deathday IS NULL THEN 'Alive' ELSE 'Deceased' END"
            }
        }
    }
}

/// A validated statistics request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub format: StatsFormat,
    pub attributes: Vec<Attribute>,
}

impl StatsRequest {
    pub fn parse<S: AsRef<str>>(format: &str, by: &[S]) -> CastResult<Self> {
        let format = StatsFormat::from_str(format)?;

        let mut attributes = Vec::new();
        for token in by {
            let attribute = Attribute::from_str(token.as_ref())?;
            if !attributes.contains(&attribute) {
                attributes.push(attribute);
            }
        }

        if attributes.is_empty() {
            return Err(CastError::Validation(
                "At least one attribute is required".to_string(),
            ));
        }

        Ok(Self { format, attributes })
    }
}

/// Category counts of one attribute, categories sorted by label
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub attribute: Attribute,
    pub counts: BTreeMap<String, i64>,
}

impl Distribution {
    /// Percent per category at one decimal; the values always add up to
    /// exactly 100.0 (largest remainder rounding).
    ///
    /// Each category gets its share floored to a tenth, then the missing
    /// tenths go to the largest remainders. Equal remainders are served in
    /// label order, so three equal categories read 33.4, 33.3, 33.3.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        let total: i64 = self.counts.values().sum();
        if total == 0 {
            return BTreeMap::new();
        }

        // Work in tenths of a percent
        let mut shares: Vec<(&String, i64, i64)> = self
            .counts
            .iter()
            .map(|(label, count)| {
                let scaled = count * 1000;
                (label, scaled / total, scaled % total)
            })
            .collect();

        let assigned: i64 = shares.iter().map(|(_, tenths, _)| tenths).sum();
        let mut leftover = 1000 - assigned;

        let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
        by_remainder.sort_by(|a, b| shares[*b].2.cmp(&shares[*a].2));
        for index in by_remainder {
            if leftover == 0 {
                break;
            }
            shares[index].1 += 1;
            leftover -= 1;
        }

        shares
            .into_iter()
            .map(|(label, tenths, _)| (label.clone(), tenths as f64 / 10.0))
            .collect()
    }

    fn to_pie(&self) -> PieChart {
        PieChart {
            title: format!("By {}", self.attribute.as_str().replace('_', " ")),
            slices: self
                .counts
                .iter()
                .map(|(label, count)| PieSlice {
                    label: label.clone(),
                    count: *count,
                })
                .collect(),
        }
    }
}

/// Summary figures shared by both output formats
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: i64,
    pub total_updated: i64,
    pub distributions: Vec<Distribution>,
}

impl Summary {
    /// `{total, total-updated, by-<attribute>: {...}}` in request order
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("total".to_string(), Value::from(self.total));
        body.insert("total-updated".to_string(), Value::from(self.total_updated));

        for distribution in &self.distributions {
            let percentages: Map<String, Value> = distribution
                .percentages()
                .into_iter()
                .map(|(label, percent)| (label, Value::from(percent)))
                .collect();
            body.insert(
                format!("by-{}", distribution.attribute.as_str()),
                Value::Object(percentages),
            );
        }

        Value::Object(body)
    }

    /// Update-status pie first, then one pie per attribute
    pub fn to_pies(&self) -> Vec<PieChart> {
        let mut pies = vec![PieChart {
            title: "By update status".to_string(),
            slices: vec![
                PieSlice {
                    label: "Not updated".to_string(),
                    count: self.total - self.total_updated,
                },
                PieSlice {
                    label: "Updated 24h".to_string(),
                    count: self.total_updated,
                },
            ],
        }];
        pies.extend(self.distributions.iter().map(Distribution::to_pie));
        pies
    }
}

/// Rendered summary
#[derive(Debug, Clone, PartialEq)]
pub enum StatsOutput {
    Json(Value),
    Image {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

/// Gather counts for the requested attributes
pub async fn collect_summary(
    store: &ActorStore,
    attributes: &[Attribute],
    now: DateTime<Utc>,
) -> CastResult<Summary> {
    if store.is_empty().await? {
        return Err(CastError::NotFound("There is no actor in the database".to_string()));
    }

    let total = store.count().await?;
    let cutoff = format_timestamp(now - Duration::hours(24));
    let total_updated = store.count_updated_since(&cutoff).await?;

    let mut distributions = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let mut counts = BTreeMap::new();
        for (category, count) in store.category_counts(attribute.category_expression()).await? {
            let label = category.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            *counts.entry(label).or_insert(0) += count;
        }
        distributions.push(Distribution {
            attribute: *attribute,
            counts,
        });
    }

    Ok(Summary {
        total,
        total_updated,
        distributions,
    })
}

/// Summarize the store in the requested format
pub async fn summarize(
    store: &ActorStore,
    renderer: &dyn ChartRenderer,
    request: &StatsRequest,
    now: DateTime<Utc>,
) -> CastResult<StatsOutput> {
    let summary = collect_summary(store, &request.attributes, now).await?;
    metrics::record_statistics_request(request.format.as_str());

    match request.format {
        StatsFormat::Json => Ok(StatsOutput::Json(summary.to_json())),
        StatsFormat::Image => {
            let bytes = renderer.render(&summary.to_pies())?;
            Ok(StatsOutput::Image {
                content_type: renderer.content_type(),
                bytes,
            })
        }
    }
}
