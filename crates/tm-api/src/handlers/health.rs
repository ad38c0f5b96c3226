use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde_json::json;

use crate::SharedState;
use crate::error::ApiError;

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    let reference = state.reference.check_ready().await?;

    Ok(Json(json!({
        "status": "ok",
        "reference": reference,
        "application": env!("CARGO_PKG_NAME"),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_common::repository::ReferenceSnapshot;

    #[tokio::test]
    async fn readyz_rejects_when_readiness_disabled() {
        let state = crate::test_state(ReferenceSnapshot::default());
        state.readiness.store(false, Ordering::SeqCst);

        match readyz(State(state)).await {
            Err(ApiError::ServiceUnavailable(code)) => assert_eq!(code, "shutting_down"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_backed_state_is_ready() {
        let state = crate::test_state(ReferenceSnapshot::default());
        let Json(body) = readyz(State(state)).await.unwrap();
        assert_eq!(body["reference"], "snapshot");
    }
}
