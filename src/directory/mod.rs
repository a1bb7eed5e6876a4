/// External actor directory
///
/// The directory is consulted only when an actor is first added: a name
/// search to identify the person, then a credit lookup for their shows.

pub mod tvmaze;

use crate::error::CastResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use tvmaze::TvMazeClient;

/// A person as returned by a directory search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPerson {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<NamedRef>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub deathday: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Nested object that only matters for its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// One cast credit of a person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastCredit {
    pub show: NamedRef,
}

/// Lookup seam for the external directory
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Search people by name, best match first
    async fn search(&self, name: &str) -> CastResult<Vec<DirectoryPerson>>;

    /// All cast credits of a person
    async fn credits(&self, external_id: i64) -> CastResult<Vec<CastCredit>>;
}
