//! Instance metadata endpoint.

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Instance metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub max_poll_options: usize,
    pub max_tags: usize,
}

/// Get instance metadata.
async fn get_meta(State(state): State<AppState>) -> ApiResponse<MetaResponse> {
    ApiResponse::ok(MetaResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        default_page_size: state.forum.default_page_size,
        max_page_size: state.forum.max_page_size,
        max_poll_options: state.forum.max_poll_options,
        max_tags: state.forum.max_tags,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_meta))
}
