use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Unknown upstream event: {0}")]
    UnknownEvent(String),

    #[error("Malformed {event} payload: {source}")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StatsError>;
