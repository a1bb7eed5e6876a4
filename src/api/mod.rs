/// API routes and handlers
pub mod actors;
pub mod health;
pub mod middleware;

use crate::{context::AppContext, error::CastResult, metrics};
use axum::{http::header, response::IntoResponse, routing::get, Router};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(actors::routes())
        .merge(health::routes())
        .route("/metrics", get(export_metrics))
}

/// Prometheus scrape endpoint
async fn export_metrics() -> CastResult<impl IntoResponse> {
    let body = metrics::render_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
