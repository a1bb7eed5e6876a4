/// Actor Store - Record store for cached actors
///
/// Two tables: `actor` holds one row per cached actor, `actor_show` holds
/// the shows each actor appeared in and is cleared by cascade when the
/// actor row goes away.

pub mod models;
pub mod store;

pub use models::*;
pub use store::{ActorStore, PageRequest, SortDirection};
