use crate::host::HostError;
use crate::settings::SettingsError;
use crate::storage::{ScopeKind, StorageError};
use crate::transfer::TransferError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no active {} to operate on", .0.label())]
    ScopeUnavailable(ScopeKind),
    #[error("no theme saved for the active {}", .0.label())]
    NothingSaved(ScopeKind),
    #[error("nothing to delete for the active {}", .0.label())]
    NothingToDelete(ScopeKind),
    #[error("auto-slot is empty")]
    AutoSlotEmpty,
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
