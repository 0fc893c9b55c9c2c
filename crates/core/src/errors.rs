use thiserror::Error;

/// A result type for Xopt errors
pub type Result<T> = std::result::Result<T, XoptError>;

/// An error for the experiment optimization toolbox
#[derive(Error, Debug)]
pub enum XoptError {
    /// When the problem definition is ill-formed
    #[error("VOCS error: {0}")]
    VocsError(String),
    /// When a generator cannot fulfill a request
    #[error("Generator error: {0}")]
    GeneratorError(String),
    /// When a sequential generator is misused while active
    #[error("Sequential generator error: {0}")]
    SequentialError(String),
    /// When an evaluation fails in strict mode
    #[error("Evaluation error: {0}")]
    EvaluationError(String),
    /// When no successful evaluation is available to learn from
    #[error("No valid results")]
    NoValidResults,
    /// When the evaluation budget is exhausted
    #[error("Maximum number of evaluations reached ({0})")]
    MaxEvaluations(usize),
    /// When a surrogate model cannot be built
    #[error("Model error: {0}")]
    ModelError(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    /// When csv reading or writing fails
    #[error(transparent)]
    CsvError(#[from] csv::Error),
    /// When json (de)serialization fails
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}
