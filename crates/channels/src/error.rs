/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors for the channel seams.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call violated a seam contract, e.g. a scoped pairing call against
    /// a legacy store.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// The account id is not started or registered.
    #[error("unknown channel account: {account_id}")]
    UnknownAccount { account_id: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_account(account_id: impl std::fmt::Display) -> Self {
        Self::UnknownAccount {
            account_id: account_id.to_string(),
        }
    }
}
