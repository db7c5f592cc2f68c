use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use std::sync::Arc;

use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    Json(serde_json::json!({
        "status": "healthy",
        "dry_run": state.dry_run,
        "model": state.model,
        "uptime_secs": (now - state.started_at).num_seconds(),
        "timestamp": now.to_rfc3339()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn reports_mode_and_model() {
        let state = Arc::new(AppState {
            started_at: Utc::now(),
            dry_run: true,
            model: "llama3.2".to_string(),
        });
        let response = health_handler(State(state)).await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["model"], "llama3.2");
    }
}
