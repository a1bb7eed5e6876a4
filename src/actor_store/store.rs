/// Actor Store - persistence for actors and their show associations
use crate::{
    actor_store::models::*,
    error::{CastError, CastResult},
};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

/// Sort direction for one ORDER BY key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Page request against the actor table.
///
/// Column names are `'static` so only compiled-in identifiers can reach
/// the SQL text.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub columns: Vec<&'static str>,
    pub order: Vec<(&'static str, SortDirection)>,
    pub limit: i64,
    pub offset: i64,
}

/// Actor Store
#[derive(Clone)]
pub struct ActorStore {
    db: SqlitePool,
}

impl ActorStore {
    /// Create a new actor store
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Number of stored actors
    pub async fn count(&self) -> CastResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM actor")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Whether no actor has been stored yet
    pub async fn is_empty(&self) -> CastResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM actor)")
            .fetch_one(&self.db)
            .await?;
        Ok(!exists)
    }

    /// Number of actors whose `last_update` is at or after `cutoff`
    pub async fn count_updated_since(&self, cutoff: &str) -> CastResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM actor WHERE last_update >= ?1")
            .bind(cutoff)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Whether an actor with this normalized name is stored
    pub async fn exists_by_name_key(&self, name_key: &str) -> CastResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM actor WHERE name_key = ?1)")
                .bind(name_key)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    /// Insert an actor and its shows in one transaction, returning the new id
    pub async fn insert(
        &self,
        actor: &NewActor,
        shows: &[String],
        last_update: &str,
    ) -> CastResult<i64> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO actor (name, name_key, external_id, country, birthday, deathday, gender, last_update)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&actor.name)
        .bind(normalize_name(&actor.name))
        .bind(actor.external_id)
        .bind(&actor.country)
        .bind(&actor.birthday)
        .bind(&actor.deathday)
        .bind(&actor.gender)
        .bind(last_update)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_name_or(e, &actor.name))?;

        let id = result.last_insert_rowid();
        insert_shows(&mut tx, id, shows).await?;

        tx.commit().await?;

        tracing::debug!("Stored actor {} ({}) with {} shows", id, actor.name, shows.len());
        Ok(id)
    }

    /// Get an actor by id
    pub async fn get(&self, id: i64) -> CastResult<Option<Actor>> {
        let actor = sqlx::query_as::<_, Actor>(
            r#"
            SELECT id, name, external_id, country, birthday, deathday, gender, last_update
            FROM actor
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(actor)
    }

    /// Show names for an actor, in the order they were stored
    pub async fn shows(&self, id: i64) -> CastResult<Vec<String>> {
        let shows: Vec<String> =
            sqlx::query_scalar("SELECT show_name FROM actor_show WHERE actor_id = ?1 ORDER BY rowid")
                .bind(id)
                .fetch_all(&self.db)
                .await?;
        Ok(shows)
    }

    /// Closest existing ids below and above `id`. Deleted ids leave gaps.
    pub async fn neighbours(&self, id: i64) -> CastResult<(Option<i64>, Option<i64>)> {
        let previous: Option<i64> =
            sqlx::query_scalar("SELECT id FROM actor WHERE id < ?1 ORDER BY id DESC LIMIT 1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        let next: Option<i64> =
            sqlx::query_scalar("SELECT id FROM actor WHERE id > ?1 ORDER BY id ASC LIMIT 1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok((previous, next))
    }

    /// Apply changes to an actor; fields and shows are written in one
    /// transaction. Returns the updated actor.
    pub async fn update(
        &self,
        id: i64,
        changes: &ActorChanges,
        last_update: String,
    ) -> CastResult<Actor> {
        let mut tx = self.db.begin().await?;

        let mut actor = sqlx::query_as::<_, Actor>(
            r#"
            SELECT id, name, external_id, country, birthday, deathday, gender, last_update
            FROM actor
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| actor_not_found(id))?;

        actor.apply(changes, last_update);

        sqlx::query(
            r#"
            UPDATE actor
            SET name = ?1, name_key = ?2, external_id = ?3, country = ?4,
                birthday = ?5, deathday = ?6, gender = ?7, last_update = ?8
            WHERE id = ?9
            "#,
        )
        .bind(&actor.name)
        .bind(normalize_name(&actor.name))
        .bind(actor.external_id)
        .bind(&actor.country)
        .bind(&actor.birthday)
        .bind(&actor.deathday)
        .bind(&actor.gender)
        .bind(&actor.last_update)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_name_or(e, &actor.name))?;

        if let Some(shows) = &changes.shows {
            sqlx::query("DELETE FROM actor_show WHERE actor_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_shows(&mut tx, id, shows).await?;
        }

        tx.commit().await?;

        Ok(actor)
    }

    /// Delete an actor; its shows go with it. Returns false if absent.
    pub async fn delete(&self, id: i64) -> CastResult<bool> {
        let result = sqlx::query("DELETE FROM actor WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch one page of raw rows
    pub async fn fetch_page(&self, request: &PageRequest) -> CastResult<Vec<SqliteRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        {
            let mut columns = builder.separated(", ");
            for column in &request.columns {
                columns.push(*column);
            }
        }
        builder.push(" FROM actor");

        if !request.order.is_empty() {
            builder.push(" ORDER BY ");
            let mut keys = builder.separated(", ");
            for (column, direction) in &request.order {
                keys.push(format!("{} {}", column, direction.as_sql()));
            }
        }

        builder.push(" LIMIT ");
        builder.push_bind(request.limit);
        builder.push(" OFFSET ");
        builder.push_bind(request.offset);

        tracing::debug!("Listing query: {}", builder.sql());

        let rows = builder.build().fetch_all(&self.db).await?;
        Ok(rows)
    }

    /// Row counts grouped by a category expression. A NULL category
    /// means unknown.
    pub async fn category_counts(
        &self,
        expression: &'static str,
    ) -> CastResult<Vec<(Option<String>, i64)>> {
        let sql = format!(
            "SELECT {} AS category, COUNT(*) AS total FROM actor GROUP BY category ORDER BY category",
            expression
        );

        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;

        let counts = rows
            .into_iter()
            .map(|row| {
                let category: Option<String> = row.get("category");
                let total: i64 = row.get("total");
                (category, total)
            })
            .collect();

        Ok(counts)
    }
}

async fn insert_shows(
    tx: &mut Transaction<'_, Sqlite>,
    actor_id: i64,
    shows: &[String],
) -> CastResult<()> {
    for show in shows {
        sqlx::query("INSERT OR IGNORE INTO actor_show (actor_id, show_name) VALUES (?1, ?2)")
            .bind(actor_id)
            .bind(show)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn duplicate_name_or(err: sqlx::Error, name: &str) -> CastError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            CastError::AlreadyExists(format!("Actor {} already exists", name))
        }
        _ => CastError::Database(err),
    }
}

pub(crate) fn actor_not_found(id: i64) -> CastError {
    CastError::NotFound(format!("Actor with id {} is not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn create_test_store() -> ActorStore {
        ActorStore::new(db::create_memory_pool().await.unwrap())
    }

    fn new_actor(name: &str) -> NewActor {
        NewActor {
            name: name.to_string(),
            external_id: Some(42),
            country: Some("United States".to_string()),
            birthday: Some("1963-12-18".to_string()),
            deathday: None,
            gender: Some("Male".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = create_test_store().await;
        assert!(store.is_empty().await.unwrap());

        let shows = vec!["Friends".to_string(), "Friends".to_string(), "Lost".to_string()];
        let id = store
            .insert(&new_actor("Brad Pitt"), &shows, "2022-03-21-10:00:00")
            .await
            .unwrap();

        let actor = store.get(id).await.unwrap().unwrap();
        assert_eq!(actor.name, "Brad Pitt");
        assert_eq!(actor.external_id, Some(42));
        assert_eq!(actor.deathday, None);
        assert_eq!(actor.last_update, "2022-03-21-10:00:00");

        // Duplicate associations are ignored
        assert_eq!(store.shows(id).await.unwrap(), vec!["Friends", "Lost"]);
        assert!(store.exists_by_name_key("brad pitt").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected_by_store() {
        let store = create_test_store().await;
        store.insert(&new_actor("Brad Pitt"), &[], "t").await.unwrap();

        let err = store
            .insert(&new_actor("BRAD  PITT"), &[], "t")
            .await
            .unwrap_err();
        assert!(matches!(err, CastError::AlreadyExists(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_ids_are_not_reused() {
        let store = create_test_store().await;
        let first = store
            .insert(&new_actor("A One"), &["Show".to_string()], "t")
            .await
            .unwrap();
        let second = store.insert(&new_actor("B Two"), &[], "t").await.unwrap();

        assert!(store.delete(second).await.unwrap());
        assert!(!store.delete(second).await.unwrap());
        assert!(store.delete(first).await.unwrap());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM actor_show")
            .fetch_one(&store.db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);

        let third = store.insert(&new_actor("C Three"), &[], "t").await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_neighbours_skip_gaps() {
        let store = create_test_store().await;
        let a = store.insert(&new_actor("A A"), &[], "t").await.unwrap();
        let b = store.insert(&new_actor("B B"), &[], "t").await.unwrap();
        let c = store.insert(&new_actor("C C"), &[], "t").await.unwrap();
        store.delete(b).await.unwrap();

        assert_eq!(store.neighbours(a).await.unwrap(), (None, Some(c)));
        assert_eq!(store.neighbours(c).await.unwrap(), (Some(a), None));
    }

    #[tokio::test]
    async fn test_update_replaces_shows() {
        let store = create_test_store().await;
        let id = store
            .insert(&new_actor("Jane Roe"), &["Old".to_string()], "t0")
            .await
            .unwrap();

        let changes = ActorChanges {
            name: Some("Jane Doe".to_string()),
            gender: Some(None),
            shows: Some(vec!["New 1".to_string(), "New 2".to_string()]),
            ..Default::default()
        };
        let updated = store.update(id, &changes, "t1".to_string()).await.unwrap();

        assert_eq!(updated.external_id, None);
        assert_eq!(store.get(id).await.unwrap().unwrap(), updated);
        assert_eq!(store.shows(id).await.unwrap(), vec!["New 1", "New 2"]);
        assert!(store.exists_by_name_key("jane doe").await.unwrap());
        assert!(!store.exists_by_name_key("jane roe").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_actor() {
        let store = create_test_store().await;
        let err = store
            .update(99, &ActorChanges::default(), "t".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CastError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_conflicts() {
        let store = create_test_store().await;
        store.insert(&new_actor("Jane Roe"), &[], "t").await.unwrap();
        let other = store.insert(&new_actor("John Roe"), &[], "t").await.unwrap();

        let changes = ActorChanges {
            name: Some("jane roe".to_string()),
            ..Default::default()
        };
        let err = store.update(other, &changes, "t1".to_string()).await.unwrap_err();
        assert!(matches!(err, CastError::AlreadyExists(_)));
        assert_eq!(store.get(other).await.unwrap().unwrap().name, "John Roe");
    }

    #[tokio::test]
    async fn test_category_counts() {
        let store = create_test_store().await;
        store.insert(&new_actor("A A"), &[], "t").await.unwrap();
        let mut unknown_gender = new_actor("B B");
        unknown_gender.gender = None;
        store.insert(&unknown_gender, &[], "t").await.unwrap();

        let counts = store.category_counts("gender").await.unwrap();
        assert_eq!(counts, vec![(None, 1), (Some("Male".to_string()), 1)]);
    }
}
