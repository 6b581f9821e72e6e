//! Construction errors.

use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error raised when the detector network cannot be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid model configuration")]
    Config {
        #[source]
        source: BoxedError,
    },
    #[error("failed to build {backbone} backbone")]
    Backbone {
        backbone: String,
        #[source]
        source: BoxedError,
    },
    #[error("failed to build detection head")]
    Head {
        #[source]
        source: BoxedError,
    },
}

impl BuildError {
    pub(crate) fn config(source: impl Into<BoxedError>) -> Self {
        Self::Config {
            source: source.into(),
        }
    }

    pub(crate) fn backbone(backbone: impl ToString, source: impl Into<BoxedError>) -> Self {
        Self::Backbone {
            backbone: backbone.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn head(source: impl Into<BoxedError>) -> Self {
        Self::Head {
            source: source.into(),
        }
    }
}
