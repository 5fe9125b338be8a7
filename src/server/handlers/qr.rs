use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{
    profile::{BorrowerProfile, ProfileService},
    qr::{
        Download, IdentityPayload, RenderOptions, decode, export::profile_file_name, render,
        render_or_placeholder,
    },
};
use crate::server::{AppState, errors::AppError};

/// A borrower's QR code, ready to drop into an `<img src>`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileQrResponse {
    /// The JSON text encoded in the symbol.
    pub payload: String,
    /// PNG data URL, empty when rendering failed.
    pub image: String,
}

#[instrument(skip(state))]
pub async fn profile_qr<P: ProfileService>(
    State(state): State<AppState<P>>,
    Path(id): Path<String>,
) -> Result<Json<ProfileQrResponse>, AppError> {
    let profile = state.profiles.fetch_profile(&id).await?;
    qr_response(&profile, state.render).await.map(Json)
}

#[instrument(skip(state))]
pub async fn profile_qr_png<P: ProfileService>(
    State(state): State<AppState<P>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let profile = state.profiles.fetch_profile(&id).await?;
    let payload = profile.to_payload()?;
    let options = state.render;
    let file_name = profile_file_name(&profile.id);

    let download = tokio::task::spawn_blocking(move || {
        let image = render(&payload, &options)?;
        Download::png(&image, file_name)
    })
    .await
    .map_err(AppError::internal)??;

    let headers = [
        (header::CONTENT_TYPE, download.content_type.to_string()),
        (header::CONTENT_DISPOSITION, download.content_disposition()),
    ];
    Ok((headers, Body::from(download.bytes)).into_response())
}

/// Validates text read from a QR code.
#[instrument(skip(body))]
pub async fn decode_payload(body: String) -> Result<Json<IdentityPayload>, AppError> {
    Ok(Json(decode(body.trim())?))
}

pub(crate) async fn qr_response(
    profile: &BorrowerProfile,
    options: RenderOptions,
) -> Result<ProfileQrResponse, AppError> {
    let payload = profile.to_payload()?;
    let encoded = payload.clone();

    let image = tokio::task::spawn_blocking(move || {
        render_or_placeholder(&encoded, &options)
            .to_data_url()
            .unwrap_or_else(|e| {
                tracing::warn!("QR export failed, using placeholder: {e}");
                String::new()
            })
    })
    .await
    .map_err(AppError::internal)?;

    Ok(ProfileQrResponse { payload, image })
}
