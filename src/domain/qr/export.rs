//! Download and share wrappers around a rendered [`QrImage`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::render::QrImage;
use crate::domain::errors::ExchangeError;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// A file ready to be handed to the user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn png(image: &QrImage, file_name: impl Into<String>) -> Result<Self, ExchangeError> {
        if image.is_placeholder() {
            return Err(ExchangeError::EncodingFailed(
                "nothing was rendered to export".to_string(),
            ));
        }
        Ok(Self {
            file_name: file_name.into(),
            content_type: PNG_CONTENT_TYPE,
            bytes: image.to_png()?,
        })
    }

    /// Value for a `Content-Disposition` header that triggers a download.
    pub fn content_disposition(&self) -> String {
        let name = self.file_name.replace(['"', '\\'], "_");
        format!("attachment; filename=\"{name}\"")
    }

    /// Writes the file into `dir`, returning the full path.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        tracing::debug!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// File name used when exporting a borrower's profile code.
pub fn profile_file_name(subject_id: &str) -> String {
    let safe: String = subject_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("borrower-{safe}-qr.png")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub title: String,
    pub text: Option<String>,
    pub file: Download,
}

/// Native share capability of the host platform.
#[async_trait]
pub trait ShareTarget: Send + Sync {
    /// Whether the platform can share files at all.
    fn is_available(&self) -> bool;

    async fn share(&self, request: ShareRequest) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Shared,
    Downloaded(Download),
}

/// Shares the image when the platform supports it, otherwise hands back a download.
///
/// A failed share also falls back to a download.
pub async fn share_or_download(
    target: &dyn ShareTarget,
    image: &QrImage,
    subject_id: &str,
    title: impl Into<String>,
) -> Result<ExportOutcome, ExchangeError> {
    let file = Download::png(image, profile_file_name(subject_id))?;

    if !target.is_available() {
        return Ok(ExportOutcome::Downloaded(file));
    }

    let request = ShareRequest {
        title: title.into(),
        text: None,
        file: file.clone(),
    };
    match target.share(request).await {
        Ok(()) => Ok(ExportOutcome::Shared),
        Err(reason) => {
            tracing::warn!("Share failed, falling back to download: {reason}");
            Ok(ExportOutcome::Downloaded(file))
        }
    }
}
