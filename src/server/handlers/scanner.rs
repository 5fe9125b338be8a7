use axum::{Json, extract::State};

use crate::domain::{profile::ProfileService, scanner::CaptureConstraints};
use crate::server::AppState;

/// Capture settings the web client applies before opening the camera.
pub async fn constraints<P: ProfileService>(
    State(state): State<AppState<P>>,
) -> Json<CaptureConstraints> {
    Json(state.scanner)
}
