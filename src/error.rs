use thiserror::Error;

/// Error kinds surfaced by the solver core.
///
/// Transient per-walker failures are recovered where they happen; everything
/// that reaches a caller through this enum is either a startup problem or a
/// structural one.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("curve operation failed: {0}")]
    CurveOperation(&'static str),

    #[error("accelerator integrity check failed: {0}")]
    AcceleratorIntegrity(String),

    #[error("corrupt checkpoint: {0}")]
    CheckpointCorrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;
