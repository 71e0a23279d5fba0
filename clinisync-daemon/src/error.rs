use thiserror::Error;

/// Error surface for the scheduler runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to start tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] clinisync_core::SettingsError),

    #[error("sync error: {0}")]
    Sync(#[from] clinisync_sync::SyncError),

    #[error("{task} task failed: {message}")]
    Task { task: &'static str, message: String },
}

pub(crate) fn task_err(task: &'static str, err: impl std::fmt::Display) -> DaemonError {
    DaemonError::Task {
        task,
        message: err.to_string(),
    }
}
