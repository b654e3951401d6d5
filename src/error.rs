use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// An experiment failed [`Experiment::validate`](crate::Experiment::validate).
///
/// Validation stops at the first violation, so a single error is reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Following `from_uid` from `uid` came back to an already visited datapoint.
    #[error("Circular reference in datapoint {uid} parents ({depth}-th parent)")]
    CircularReference { uid: String, depth: usize },

    /// `from_uid` names a datapoint that does not exist.
    #[error("Datapoint ({uid}) parent ({parent}) not found")]
    MissingParent { uid: String, parent: String },

    #[error("Datapoint {uid} contains a value for \"{key}\"")]
    ReservedKey { uid: String, key: String },

    #[error("Several datapoints share the uid {0}")]
    DuplicateUid(String),

    #[error("Not a single datapoint")]
    Empty,

    #[error("Invalid color {color} for value {value} of column {column}. Expected color to start with \"rgb(\", \"hsl(\" or \"#\"")]
    InvalidColor {
        column: String,
        value: String,
        color: String,
    },

    #[error("Invalid colormap {colormap} {location}. Expected a name starting with \"interpolate\" or \"scheme\"")]
    InvalidColormap { colormap: String, location: String },

    #[error("No datapoint has a value for {display} {setting} ({column})")]
    DanglingAxis {
        display: String,
        setting: String,
        column: String,
    },
}

impl ValidationError {
    /// True for the generic schema violations (everything but lineage errors).
    pub fn is_schema_violation(&self) -> bool {
        !matches!(
            self,
            ValidationError::CircularReference { .. } | ValidationError::MissingParent { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Crate errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum Error {
    /// Every fetcher of the chain declined the URI.
    #[error("No fetcher found for this experiment: {0}")]
    NoFetcherFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A fetcher recognised the URI but its content has the wrong shape.
    #[error("Failed to load {uri}: {message}")]
    Format { uri: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A directory could not be read while matching files.
    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    pub(crate) fn format(uri: &str, message: impl Into<String>) -> Self {
        Error::Format {
            uri: uri.to_string(),
            message: message.into(),
        }
    }
}
