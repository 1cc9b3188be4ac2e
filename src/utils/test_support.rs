//! In-process stub upstreams for tests.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::Config;

pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00,
];

pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01,
];

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

pub fn test_config(gemini_base_url: &str, tmdb_base_url: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "debug".to_string(),
        log_dir: "logs".to_string(),
        ping_message: "pong".to_string(),
        gemini_api_key: String::new(),
        gemini_base_url: gemini_base_url.trim_end_matches('/').to_string(),
        gemini_model: "gemini-test".to_string(),
        gemini_temperature: 0.7,
        gemini_analysis_max_output_tokens: 2000,
        gemini_guide_max_output_tokens: 3000,
        tmdb_api_key: "tmdb-test-key".to_string(),
        tmdb_base_url: tmdb_base_url.trim_end_matches('/').to_string(),
        tmdb_image_base_url: "https://img.test/t/p".to_string(),
        tmdb_default_query: "blade runner".to_string(),
    }
}

/// Gemini body carrying `text` as the first candidate's first part.
pub fn gemini_text_response(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

/// Answers every `generateContent` call with the same status and body.
pub async fn spawn_gemini_stub(status: StatusCode, body: Value) -> String {
    let router = Router::new().route(
        "/models/{action}",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );
    spawn_stub(router).await
}
