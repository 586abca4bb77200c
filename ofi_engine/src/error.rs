use thiserror::Error;

/// Errors raised by the OFI feature pipeline.
///
/// Shape violations are caller errors and are returned immediately.
/// Numeric degeneracy (zero depth, non-positive mid) is never an error:
/// those cases flow through as non-finite `f64` values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OfiError {
    #[error("Snapshot has no levels (depth must be at least 1)")]
    EmptyBook,

    #[error("Snapshot field {field} has {len} levels, expected {expected}")]
    LengthMismatch {
        field:    &'static str,
        len:      usize,
        expected: usize,
    },

    #[error("Snapshot depths differ: previous={previous}, current={current}")]
    DepthMismatch { previous: usize, current: usize },

    #[error("Snapshot has {depth} levels but the engine is configured for {expected}")]
    BookDepthMismatch { depth: usize, expected: usize },

    #[error("Level {level} outside 1..={depth}")]
    LevelOutOfRange { level: usize, depth: usize },

    #[error("Level index {index} outside 0..{depth}")]
    IndexOutOfRange { index: usize, depth: usize },

    #[error("Model not trained: call train() before compute()")]
    NotTrained,

    #[error("Training corpus needs at least 2 observations, got {0}")]
    InsufficientObservations(usize),

    #[error("Training row {row} has {len} columns, expected {expected}")]
    RowLengthMismatch {
        row:      usize,
        len:      usize,
        expected: usize,
    },

    #[error("Training row {row} contains a non-finite value")]
    NonFiniteObservation { row: usize },

    #[error("Projection has {weights} weights but level {level} was requested")]
    ProjectionLevelMismatch { weights: usize, level: usize },

    #[error("Covariance eigendecomposition did not converge")]
    EigenDecomposition,

    #[error("Projection weights have zero L1 norm")]
    ZeroProjection,
}

impl OfiError {
    /// True for errors caused by malformed caller input (shape, level, depth).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            OfiError::EmptyBook
                | OfiError::LengthMismatch { .. }
                | OfiError::DepthMismatch { .. }
                | OfiError::BookDepthMismatch { .. }
                | OfiError::LevelOutOfRange { .. }
                | OfiError::IndexOutOfRange { .. }
                | OfiError::RowLengthMismatch { .. }
                | OfiError::ProjectionLevelMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OfiError>;
