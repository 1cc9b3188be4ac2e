use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::gemini::summarize_error_body;
use crate::utils::http::get_http_client;
use crate::utils::logging::{redact_secrets, truncate_for_log};
use crate::utils::timing::log_upstream_timing;

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbImage {
    pub file_path: String,
    pub aspect_ratio: f64,
}

// `backdrops` is required: a listing without it counts as a failed lookup.
#[derive(Debug, Deserialize)]
struct TmdbImagesResponse {
    backdrops: Vec<TmdbImage>,
}

async fn get_json<T: serde::de::DeserializeOwned>(
    url: &str,
    api_key: &str,
    params: &[(&str, &str)],
    label: &str,
) -> Result<T, PipelineError> {
    let client = get_http_client();
    let response = client
        .get(url)
        .query(&[("api_key", api_key)])
        .query(params)
        .send()
        .await
        .map_err(|err| {
            let err_text = redact_secrets(&err.to_string(), [api_key]);
            PipelineError::transport(format!("TMDB {label} request failed: {err_text}"))
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body = redact_secrets(&body, [api_key]);
        let (message, details) = summarize_error_body(&body);
        // TMDB reports errors as `status_message`.
        let message = message
            .or_else(|| {
                details
                    .as_ref()
                    .and_then(|value| value.get("status_message"))
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("TMDB {label} request failed with status {status}"));
        warn!(
            "TMDB {} error: status={}, body={}",
            label,
            status,
            truncate_for_log(&body, 800)
        );
        return Err(PipelineError::from_upstream(status.as_u16(), message, details));
    }

    response.json::<T>().await.map_err(|err| PipelineError::UpstreamError {
        status: Some(status.as_u16()),
        message: format!("Invalid TMDB {label} response: {err}"),
        details: None,
    })
}

/// Ranked movie search for one page of results.
pub async fn search_movies(
    config: &Config,
    api_key: &str,
    query: &str,
    page: u32,
) -> Result<Vec<TmdbMovie>, PipelineError> {
    let url = format!("{}/search/movie", config.tmdb_base_url);
    let page = page.to_string();
    info!("Calling TMDB search endpoint {} with query: {}", url, query);

    log_upstream_timing(
        "tmdb",
        "-",
        "search_movie",
        Some(json!({ "query": query, "page": page })),
        || async {
            let data: TmdbSearchResponse =
                get_json(&url, api_key, &[("query", query), ("page", page.as_str())], "search").await?;
            Ok(data.results)
        },
    )
    .await
}

/// Backdrop listing for one movie, in upstream order.
pub async fn movie_backdrops(
    config: &Config,
    api_key: &str,
    movie_id: i64,
) -> Result<Vec<TmdbImage>, PipelineError> {
    let url = format!("{}/movie/{}/images", config.tmdb_base_url, movie_id);

    log_upstream_timing(
        "tmdb",
        "-",
        "movie_images",
        Some(json!({ "movieId": movie_id })),
        || async {
            let data: TmdbImagesResponse = get_json(&url, api_key, &[], "images").await?;
            Ok(data.backdrops)
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_support::{spawn_stub, test_config};
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    #[tokio::test]
    async fn search_sends_key_query_and_page() {
        let router = Router::new().route(
            "/search/movie",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({
                    "results": [{
                        "id": 1,
                        "title": params.get("query").cloned().unwrap_or_default(),
                        "release_date": params.get("page").cloned().unwrap_or_default(),
                        "backdrop_path": params.get("api_key").cloned(),
                    }]
                }))
            }),
        );
        let base = spawn_stub(router).await;
        let config = test_config(&base, &base);

        let movies = search_movies(&config, "tmdb-test-key", "mad max & fury", 3)
            .await
            .unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title.as_deref(), Some("mad max & fury"));
        assert_eq!(movies[0].release_date.as_deref(), Some("3"));
        assert_eq!(movies[0].backdrop_path.as_deref(), Some("tmdb-test-key"));
    }

    #[tokio::test]
    async fn search_error_uses_status_message() {
        let router = Router::new().route(
            "/search/movie",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "status_code": 7, "status_message": "Invalid API key" })),
                )
            }),
        );
        let base = spawn_stub(router).await;
        let config = test_config(&base, &base);

        let err = search_movies(&config, "bad", "her", 1).await.unwrap_err();
        match err {
            PipelineError::UpstreamError { status, message, .. } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn images_without_backdrops_field_fail() {
        let router = Router::new().route(
            "/movie/{id}/images",
            get(|| async { Json(json!({ "posters": [] })) }),
        );
        let base = spawn_stub(router).await;
        let config = test_config(&base, &base);

        assert!(movie_backdrops(&config, "key", 5).await.is_err());
    }

    #[tokio::test]
    async fn images_keep_upstream_order() {
        let router = Router::new().route(
            "/movie/{id}/images",
            get(|| async {
                Json(json!({
                    "backdrops": [
                        { "file_path": "/b.jpg", "aspect_ratio": 1.778 },
                        { "file_path": "/a.jpg", "aspect_ratio": 2.39 }
                    ]
                }))
            }),
        );
        let base = spawn_stub(router).await;
        let config = test_config(&base, &base);

        let images = movie_backdrops(&config, "key", 5).await.unwrap();
        let paths: Vec<&str> = images.iter().map(|image| image.file_path.as_str()).collect();
        assert_eq!(paths, ["/b.jpg", "/a.jpg"]);
    }
}
