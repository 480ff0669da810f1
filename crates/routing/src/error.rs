#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no binding or default agent matches {channel}:{peer_id}")]
    NoRoute { channel: String, peer_id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
