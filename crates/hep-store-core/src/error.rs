use crate::kv_shard::ShardError;

/// Error taxonomy surfaced by `StoreCore` (§7). `NotFound` is deliberately
/// absent: absence is represented in-band as `None`/`false` return values,
/// never as an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Routing(#[from] hep_shard_router::Error),
    #[error("repeated transport failure: {0}")]
    Transport(String),
    #[error("malformed value: {0}")]
    Serialization(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("internal invariant violated: {0}")]
    Logic(String),
}

impl Error {
    pub(crate) fn from_shard(e: ShardError) -> Self {
        match e {
            // A second transient fault (after the one automatic retry) is
            // surfaced as a hard transport error.
            ShardError::Transient(msg) => Error::Transport(msg),
            ShardError::Transport(msg) => Error::Transport(msg),
            ShardError::Remote(msg) => Error::Remote(msg),
            ShardError::Serialization(msg) => Error::Serialization(msg),
        }
    }
}
