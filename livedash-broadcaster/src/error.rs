use thiserror::Error;

use crate::client::ClientId;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client {0} is closed")]
    ClientClosed(ClientId),

    #[error("Client {0} is not keeping up")]
    ClientLagging(ClientId),
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
