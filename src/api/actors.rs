/// /actors endpoints
use crate::{
    actor_store::{display_or_unknown, format_timestamp, is_unknown_marker, normalize_name, ActorChanges},
    context::AppContext,
    error::{CastError, CastResult},
    listing::{self, ListQuery},
    metrics,
    statistics::{self, StatsOutput, StatsRequest},
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

/// Build actor routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/actors", post(create_actor).get(list_actors))
        .route("/actors/statistics", get(actor_statistics))
        .route(
            "/actors/:id",
            get(get_actor).patch(update_actor).delete(delete_actor),
        )
}

/// Query parameters for creating an actor
#[derive(Debug, Deserialize)]
struct CreateActorQuery {
    name: Option<String>,
}

/// Query parameters for listing actors
#[derive(Debug, Deserialize)]
struct ListActorsQuery {
    order: Option<String>,
    page: Option<String>,
    size: Option<String>,
    filter: Option<String>,
}

/// Query parameters for statistics
#[derive(Debug, Deserialize)]
struct StatisticsQuery {
    format: Option<String>,
    by: Option<String>,
}

/// Scheme and authority the client used to reach us
fn base_url(ctx: &AppContext, headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_else(|| ctx.service_url())
}

fn actor_href(base_url: &str, id: i64) -> Value {
    json!({ "href": format!("{}/actors/{}", base_url, id) })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| token.trim_end().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// An unescaped '+' arrives as a space after query decoding
fn restore_plus(token: String) -> String {
    let trimmed = token.trim_start();
    if trimmed.len() < token.len() && trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("+{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn parse_number(raw: Option<String>, default: i64, describe: &str) -> CastResult<i64> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CastError::Validation(format!("{} {} is invalid", describe, raw))),
    }
}

fn parse_actor_id(raw: &str) -> CastResult<i64> {
    raw.parse()
        .map_err(|_| CastError::Validation(format!("Actor id {} is invalid", raw)))
}

/// POST /actors?name=
async fn create_actor(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<CreateActorQuery>,
) -> CastResult<(StatusCode, Json<Value>)> {
    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| CastError::Validation("Actor name is required".to_string()))?;

    let created = ctx.reconciler.create_actor(&name).await?;
    let base_url = base_url(&ctx, &headers);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": created.id,
            "last-update": created.last_update,
            "_links": { "self": actor_href(&base_url, created.id) },
        })),
    ))
}

/// GET /actors
async fn list_actors(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<ListActorsQuery>,
) -> CastResult<Json<listing::ActorPage>> {
    let order: Vec<String> = split_list(query.order.as_deref().unwrap_or("+id"))
        .into_iter()
        .map(restore_plus)
        .collect();
    let filter: Vec<String> = split_list(query.filter.as_deref().unwrap_or("id,name"))
        .into_iter()
        .map(|token| token.trim_start().to_string())
        .collect();
    let page = parse_number(query.page, 1, "Page number")?;
    let size = parse_number(query.size, 10, "Size")?;

    let list_query = ListQuery::parse(order.as_slice(), page, size, filter.as_slice())?;
    let page = listing::list_actors(&ctx.store, &list_query, &base_url(&ctx, &headers)).await?;

    Ok(Json(page))
}

/// GET /actors/:id
async fn get_actor(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> CastResult<Json<Value>> {
    let id = parse_actor_id(&id)?;
    let actor = ctx
        .store
        .get(id)
        .await?
        .ok_or_else(|| CastError::NotFound(format!("Actor with id {} is not found", id)))?;
    let shows = ctx.store.shows(id).await?;
    let (previous, next) = ctx.store.neighbours(id).await?;

    let base_url = base_url(&ctx, &headers);
    let mut links = Map::new();
    links.insert("self".to_string(), actor_href(&base_url, id));
    if let Some(previous) = previous {
        links.insert("previous".to_string(), actor_href(&base_url, previous));
    }
    if let Some(next) = next {
        links.insert("next".to_string(), actor_href(&base_url, next));
    }

    Ok(Json(json!({
        "id": actor.id,
        "last-update": actor.last_update,
        "name": actor.name,
        "country": display_or_unknown(&actor.country),
        "birthday": display_or_unknown(&actor.birthday),
        "deathday": display_or_unknown(&actor.deathday),
        "gender": display_or_unknown(&actor.gender),
        "shows": shows,
        "_links": links,
    })))
}

/// PATCH /actors/:id
async fn update_actor(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> CastResult<Json<Value>> {
    let id = parse_actor_id(&id)?;
    let Json(body) = body.map_err(|e| CastError::Validation(e.body_text()))?;
    let changes = parse_changes(&body)?;

    let actor = ctx
        .store
        .update(id, &changes, format_timestamp(Utc::now()))
        .await?;

    info!("Updated actor {} ({})", actor.id, actor.name);

    let base_url = base_url(&ctx, &headers);
    Ok(Json(json!({
        "id": actor.id,
        "last-update": actor.last_update,
        "_links": { "self": actor_href(&base_url, actor.id) },
    })))
}

/// DELETE /actors/:id
async fn delete_actor(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CastResult<Json<Value>> {
    let id = parse_actor_id(&id)?;

    if !ctx.store.delete(id).await? {
        return Err(CastError::NotFound(format!("Actor with id {} is not found", id)));
    }

    metrics::ACTORS_DELETED_TOTAL.inc();
    info!("Deleted actor {}", id);

    Ok(Json(json!({
        "message": format!("The actor with id {} was removed from the database!", id),
        "id": id,
    })))
}

/// GET /actors/statistics?format=&by=
async fn actor_statistics(
    State(ctx): State<AppContext>,
    Query(query): Query<StatisticsQuery>,
) -> CastResult<Response> {
    let format = query
        .format
        .ok_or_else(|| CastError::Validation("Format is required".to_string()))?;
    let by: Vec<String> = split_list(query.by.as_deref().unwrap_or(""))
        .into_iter()
        .map(|token| token.trim_start().to_string())
        .collect();
    let request = StatsRequest::parse(&format, by.as_slice())?;

    let output =
        statistics::summarize(&ctx.store, ctx.chart_renderer.as_ref(), &request, Utc::now())
            .await?;

    Ok(match output {
        StatsOutput::Json(body) => Json(body).into_response(),
        StatsOutput::Image {
            content_type,
            bytes,
        } => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
    })
}

/// Turn a PATCH body into store changes. Only the documented keys are
/// accepted; null or an unknown marker clears a field.
fn parse_changes(body: &Value) -> CastResult<ActorChanges> {
    let fields = body
        .as_object()
        .ok_or_else(|| CastError::Validation("Request body must be a JSON object".to_string()))?;

    let mut changes = ActorChanges::default();
    for (key, value) in fields {
        match key.as_str() {
            "name" => {
                let name = value
                    .as_str()
                    .map(str::trim)
                    .filter(|name| !normalize_name(name).is_empty())
                    .ok_or_else(|| {
                        CastError::Validation(format!("Actor name {} is invalid", value))
                    })?;
                changes.name = Some(name.to_string());
            }
            "country" => changes.country = Some(optional_text(key, value)?),
            "gender" => changes.gender = Some(optional_text(key, value)?),
            "birthday" => changes.birthday = Some(optional_date(key, value)?),
            "deathday" => changes.deathday = Some(optional_date(key, value)?),
            "shows" => changes.shows = Some(show_list(value)?),
            _ => {
                return Err(CastError::Validation(format!("Attribute {} is invalid", key)));
            }
        }
    }

    Ok(changes)
}

fn optional_text(key: &str, value: &Value) -> CastResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if is_unknown_marker(text) => Ok(None),
        Value::String(text) => Ok(Some(text.trim().to_string())),
        _ => Err(CastError::Validation(format!("Attribute {} must be a string", key))),
    }
}

fn optional_date(key: &str, value: &Value) -> CastResult<Option<String>> {
    let date = optional_text(key, value)?;
    if let Some(date) = &date {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            CastError::Validation(format!("Attribute {} must be a YYYY-MM-DD date", key))
        })?;
    }
    Ok(date)
}

fn show_list(value: &Value) -> CastResult<Vec<String>> {
    let invalid = || CastError::Validation("Attribute shows must be a list of names".to_string());

    let mut shows: Vec<String> = Vec::new();
    for show in value.as_array().ok_or_else(invalid)? {
        let show = show.as_str().ok_or_else(invalid)?.trim().to_string();
        if !show.is_empty() && !shows.contains(&show) {
            shows.push(show);
        }
    }
    Ok(shows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_plus() {
        assert_eq!(restore_plus(" name".to_string()), "+name");
        assert_eq!(restore_plus("+name".to_string()), "+name");
        assert_eq!(restore_plus("-id".to_string()), "-id");
        assert_eq!(restore_plus(" -id".to_string()), "-id");
        assert_eq!(split_list(" id, -name,"), vec![" id", " -name"]);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(None, 10, "Size").unwrap(), 10);
        assert_eq!(parse_number(Some("3".into()), 10, "Size").unwrap(), 3);
        let err = parse_number(Some("three".into()), 10, "Page number").unwrap_err();
        assert_eq!(err.to_string(), "Page number three is invalid");
    }

    #[test]
    fn test_parse_changes() {
        let changes = parse_changes(&json!({
            "name": "Bradley Pitt",
            "country": "unknown",
            "gender": null,
            "birthday": "1963-12-18",
            "shows": ["Friends", "Friends", "Glee"],
        }))
        .unwrap();

        assert_eq!(changes.name.as_deref(), Some("Bradley Pitt"));
        assert_eq!(changes.country, Some(None));
        assert_eq!(changes.gender, Some(None));
        assert_eq!(changes.birthday, Some(Some("1963-12-18".to_string())));
        assert_eq!(changes.deathday, None);
        assert_eq!(changes.shows, Some(vec!["Friends".to_string(), "Glee".to_string()]));
    }

    #[test]
    fn test_parse_changes_rejects_bad_input() {
        let err = parse_changes(&json!({"height": 180})).unwrap_err();
        assert_eq!(err.to_string(), "Attribute height is invalid");

        assert!(parse_changes(&json!({"birthday": "18/12/1963"})).is_err());
        assert!(parse_changes(&json!({"name": "42"})).is_err());
        assert!(parse_changes(&json!({"shows": "Friends"})).is_err());
        assert!(parse_changes(&json!(["name"])).is_err());
    }
}
