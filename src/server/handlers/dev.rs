//! Developer-only routes, mounted when `dev_tools` is enabled.

use axum::{Json, extract::State};

use super::qr::{ProfileQrResponse, qr_response};
use crate::domain::profile::{BorrowerProfile, ProfileService};
use crate::server::{AppState, errors::AppError};

/// QR code for a fixed sample borrower, for testing scanners without a backend.
pub async fn sample_qr<P: ProfileService>(
    State(state): State<AppState<P>>,
) -> Result<Json<ProfileQrResponse>, AppError> {
    let sample = BorrowerProfile {
        id: "sample-borrower".to_string(),
        display_name: "Sample Borrower".to_string(),
        phone: "0000000000".to_string(),
    };
    qr_response(&sample, state.render).await.map(Json)
}
