use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or unreachable search target; the search never starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// An arithmetic invariant that must hold by construction was
    /// observed broken at runtime. Fatal for the worker that hit it.
    #[error("arithmetic invariant violated: {0}")]
    Arithmetic(String),

    /// A reconstructed key failed to reproduce the predicate hit.
    /// Fatal for the record; the search continues.
    #[error("verification failed (worker {worker}, offset {offset}, endo {endo}, negated {negated})")]
    Verification {
        worker: u32,
        offset: i64,
        endo: u8,
        negated: bool,
    },

    /// An accelerator device failed to start or compute.
    #[error("device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
