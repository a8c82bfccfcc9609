//! Category endpoints.

use axum::{Router, extract::State, routing::get};
use civic_common::AppResult;
use civic_core::CategoryWithCount;
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Category with its post count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    pub posts_count: u64,
}

impl From<CategoryWithCount> for CategoryResponse {
    fn from(item: CategoryWithCount) -> Self {
        Self {
            id: item.category.id,
            name: item.category.name,
            slug: item.category.slug,
            description: item.category.description,
            color: item.category.color,
            posts_count: item.posts_count,
        }
    }
}

/// List categories in display order.
async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CategoryResponse>>> {
    let categories = state.category_service.list().await?;
    Ok(ApiResponse::ok(
        categories.into_iter().map(Into::into).collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}
