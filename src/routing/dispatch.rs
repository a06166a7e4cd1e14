//! Route dispatch: build the upstream URL, call upstream, relay the result.

use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::http::response::{Failure, JsonPassthrough};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::routes::RouteDescriptor;
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamUrl, UrlBuilder};

/// Query parameters accepted by list routes.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Raw suffix forwarded to the upstream, e.g. `&genres=4&page=2`.
    #[serde(rename = "queryParams")]
    pub query_params: Option<String>,
}

/// Turns route invocations into upstream calls.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    urls: UrlBuilder,
    client: UpstreamClient,
    deadline: Duration,
}

impl Dispatcher {
    /// `deadline` bounds the whole upstream exchange for one inbound request.
    pub fn new(urls: UrlBuilder, client: UpstreamClient, deadline: Duration) -> Self {
        Self { urls, client, deadline }
    }

    /// Fetch the route and validate that the body is JSON.
    ///
    /// The body is returned untouched so the caller sees the upstream bytes.
    pub async fn fetch(&self, url: &UpstreamUrl) -> Result<String, UpstreamError> {
        let body = tokio::time::timeout(self.deadline, self.client.get_text(url))
            .await
            .map_err(|_| UpstreamError::DeadlineExceeded(self.deadline.as_secs()))??;
        serde_json::from_str::<&RawValue>(&body)?;
        Ok(body)
    }

    /// Dispatch one route and convert the outcome into a response.
    pub async fn relay(&self, route: &RouteDescriptor, id: Option<i32>, query: Option<&str>) -> Response {
        let start = Instant::now();
        let url = self.urls.build(&route.upstream_path(id), query);

        match self.fetch(&url).await {
            Ok(body) => {
                tracing::debug!(
                    route = route.name,
                    url = %url,
                    bytes = body.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream call succeeded"
                );
                metrics::record_request(route.name, 200, start);
                JsonPassthrough(body).into_response()
            }
            Err(e) => {
                tracing::error!(
                    route = route.name,
                    url = %url,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream call failed"
                );
                metrics::record_request(route.name, 400, start);
                Failure(e.to_string()).into_response()
            }
        }
    }
}

/// Axum method router for one descriptor.
///
/// Ids are extracted as `i32`, so non-integer path segments are rejected by
/// the extractor and never reach the dispatcher.
pub fn method_router(route: &'static RouteDescriptor) -> MethodRouter<AppState> {
    if route.accepts_query() {
        get(
            move |State(state): State<AppState>, Query(params): Query<ListParams>| async move {
                state
                    .dispatcher
                    .relay(route, None, params.query_params.as_deref())
                    .await
            },
        )
    } else {
        get(
            move |State(state): State<AppState>, Path(id): Path<i32>| async move {
                state.dispatcher.relay(route, Some(id), None).await
            },
        )
    }
}
