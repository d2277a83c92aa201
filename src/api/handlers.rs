use crate::api::AppState;
use crate::error::Result;
use crate::search::{DiscoverableIndex, FacetSelection, IndexTarget, Pagination, SearchRequest};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match state.composer.store().health().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            "unreachable"
        }
    };

    Json(HealthResponse {
        status: if store == "ok" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store: store.to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: String,
}

/// List the indexes readers can select by position
pub async fn list_indexes(State(state): State<AppState>) -> Result<Json<IndexListResponse>> {
    let indexes = state.composer.list().await?;
    Ok(Json(IndexListResponse { indexes }))
}

#[derive(Debug, Serialize)]
pub struct IndexListResponse {
    pub indexes: Vec<DiscoverableIndex>,
}

/// Search one index or all of them
///
/// The response body is the store's search result, untouched.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    let request = params.into_request(state.default_page_size);
    let result = state.composer.search(&request).await?;
    Ok(Json(result.into_value()))
}

/// Raw `/search` query parameters
///
/// Everything is taken as text so malformed numbers fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub index: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub taxonomies: Option<String>,
    pub galaxy: Option<String>,
    #[serde(rename = "facetsDistribution")]
    pub facets_distribution: Option<String>,
}

impl SearchParams {
    pub fn into_request(self, default_page_size: i64) -> SearchRequest {
        let target = self
            .index
            .as_deref()
            .map(IndexTarget::parse)
            .unwrap_or_default();
        let pagination = Pagination::from_params(
            self.page.as_deref(),
            self.page_size.as_deref(),
            default_page_size,
        );
        let facets = FacetSelection::from_params(
            self.taxonomies.as_deref(),
            self.galaxy.as_deref(),
            self.facets_distribution.as_deref(),
        );

        SearchRequest::new(self.q.unwrap_or_default())
            .with_target(target)
            .with_pagination(pagination)
            .with_facets(facets)
    }
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
