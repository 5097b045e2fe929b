pub mod app;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod mask;
pub mod notification;
pub mod registry;
pub mod settings;
pub mod snapshot;
pub mod storage;
pub mod transfer;
pub use app::ThemeSync;
pub use error::{AppError, AppResult};

/// Parse an export document and describe it.
pub fn inspect(json: &str) -> AppResult<transfer::ExportFile> {
    let export = transfer::parse_export(json)?;
    tracing::debug!("parsed export document");
    Ok(export)
}
