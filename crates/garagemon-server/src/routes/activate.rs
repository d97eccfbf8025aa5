use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of every `/activate` reply. The status code is always 200; an
/// empty object means the door was triggered.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /activate: trigger the door once.
pub async fn activate(State(app): State<AppState>) -> Json<ActivateResponse> {
    match app.actuator.activate().await {
        Ok(()) => Json(ActivateResponse::default()),
        Err(e) => {
            tracing::warn!("Activation failed: {e}");
            Json(ActivateResponse {
                error: Some(e.to_string()),
            })
        }
    }
}
