use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the rendering core.
///
/// `Source` and `Sink` are fatal and abort a run. `ConfigValidation` is
/// raised before any frame work starts. `InsufficientSamples` is recovered
/// locally by zero-padding and never reaches the caller of a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("audio source: {message}")]
    Source {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("block of {got} samples is shorter than the {needed}-sample analysis window")]
    InsufficientSamples { got: usize, needed: usize },

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("frame sink: {message}")]
    Sink {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("failed to read config file {path}: {message}")]
    ConfigIo { path: PathBuf, message: String },
}

impl Error {
    pub fn source_msg<T: Into<String>>(message: T) -> Self {
        Self::Source {
            message: message.into(),
            cause: None,
        }
    }

    pub fn source_with<T, E>(message: T, cause: E) -> Self
    where
        T: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn sink_msg<T: Into<String>>(message: T) -> Self {
        Self::Sink {
            message: message.into(),
            cause: None,
        }
    }

    pub fn sink_with<T, E>(message: T, cause: E) -> Self
    where
        T: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Sink {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Sink {
            message: e.to_string(),
            cause: Some(Box::new(e)),
        }
    }
}
