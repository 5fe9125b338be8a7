//! Producer side of the profile exchange: payload codec, QR rendering and export.

pub mod export;
pub mod payload;
pub mod render;

pub use export::{Download, ExportOutcome, ShareRequest, ShareTarget, share_or_download};
pub use payload::{IdentityPayload, PayloadKind, decode, encode};
pub use render::{Color, ErrorCorrection, QrImage, RenderOptions, render, render_or_placeholder};
