use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem or config-persistence failure during dynamic agent
    /// provisioning. Fatal for that request; no partial binding is left
    /// committed.
    #[error("dynamic agent provisioning failed: {context}: {error}")]
    Provisioning { context: String, error: anyhow::Error },

    #[error(transparent)]
    Channel(#[from] skylark_channels::Error),

    #[error(transparent)]
    Routing(#[from] skylark_routing::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn provisioning(context: impl Into<String>, error: impl Into<anyhow::Error>) -> Self {
        Self::Provisioning {
            context: context.into(),
            error: error.into(),
        }
    }

}

impl skylark_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skylark_common::impl_context!();
