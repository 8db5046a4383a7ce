use thiserror::Error;

/// Failures surfaced by the session engine. Recoverable conditions
/// (reconciliation failures, index-persistence failures, cap
/// rejections) never appear here; they are logged or reported as plain
/// outcomes instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Question fetch or session open failed during `start`. The
    /// session stays in setup and no partial state is created.
    #[error("failed to start test session: {0:#}")]
    SetupFailed(#[source] anyhow::Error),

    #[error("a test session is already running")]
    AlreadyActive,

    #[error("operation requires an active test session")]
    NotActive,

    #[error("results are not available before the session has finished")]
    NotFinished,

    #[error("question {0} is not part of the current paper")]
    UnknownQuestion(u32),

    /// Rank lookup failed. Recoverable: results stay available and the
    /// caller may retry.
    #[error("rank estimate is currently unavailable: {0:#}")]
    RankUnavailable(#[source] anyhow::Error),

    /// The engine task has shut down and its command channel is closed.
    #[error("session engine is no longer running")]
    Closed,
}
