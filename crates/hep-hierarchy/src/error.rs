#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] hep_store_core::Error),
    #[error(transparent)]
    Key(#[from] hep_key_codec::Error),
    #[error(transparent)]
    Product(#[from] hep_product_store::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("cursor is not positioned at a valid item")]
    CursorExhausted,
}
