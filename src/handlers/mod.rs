/// HTTP request handlers
use crate::commands::CommandMap;
use crate::domain::{Health, Incursion};
use crate::errors::{ApiError, ApiResult};
use crate::services::IncursionManager;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<IncursionManager>,
    pub commands: Arc<CommandMap>,
    pub started_at: DateTime<Utc>,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Serialize)]
pub struct IncursionList {
    pub populated: bool,
    pub items: Vec<Incursion>,
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let now = Utc::now();
    Json(Health {
        status: "ok",
        now,
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}

/// Currently tracked incursions
pub async fn get_incursions(
    State(state): State<AppState>,
) -> Json<SuccessResponse<IncursionList>> {
    Json(SuccessResponse::new(IncursionList {
        populated: state.manager.is_populated(),
        items: state.manager.get_incursions(),
    }))
}

/// Next respawn windows per security band
pub async fn next_spawns(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "message": state.manager.next_spawns()
    }))))
}

/// Run a chat command, e.g. `?text=!incursions`
pub async fn run_command(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let text = params
        .get("text")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("missing command text".to_string()))?;

    let reply = state
        .commands
        .dispatch(text)
        .ok_or_else(|| ApiError::NotFound(format!("unknown command '{}'", text)))?;

    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "reply": reply
        })
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::incursion_commands;
    use crate::services::testing::{FakeUniverse, RecordingNotifier};
    use std::sync::atomic::AtomicBool;

    fn state() -> AppState {
        let manager = Arc::new(IncursionManager::new(
            Arc::new(FakeUniverse::default()),
            Arc::new(RecordingNotifier::default()),
        ));
        let started_at = Utc::now();
        AppState {
            commands: Arc::new(incursion_commands(
                manager.clone(),
                Arc::new(AtomicBool::new(false)),
                started_at,
            )),
            manager,
            started_at,
        }
    }

    fn query(text: &str) -> Query<HashMap<String, String>> {
        Query(HashMap::from([("text".to_string(), text.to_string())]))
    }

    #[tokio::test]
    async fn test_run_command_replies() {
        let Json(body) = run_command(query("!help"), State(state())).await.unwrap();
        assert_eq!(body["ok"], true);
        let reply = body["reply"].as_str().unwrap();
        assert!(reply.contains("!incursions"));
        assert!(reply.contains("!esi  -  Prints the bot's ESI connection status"));
    }

    #[tokio::test]
    async fn test_run_command_rejects_unknown_and_empty() {
        let err = run_command(query("!nope"), State(state())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = run_command(query("  "), State(state())).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = run_command(Query(HashMap::new()), State(state()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_incursions_before_first_poll() {
        let Json(body) = get_incursions(State(state())).await;
        assert!(body.ok);
        assert!(!body.data.populated);
        assert!(body.data.items.is_empty());
    }
}
