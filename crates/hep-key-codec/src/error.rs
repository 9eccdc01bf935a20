#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("dataset names may not contain '/' or '%': {0:?}")]
    InvalidDatasetName(String),

    #[error("dataset key is missing its '/' name separator")]
    MissingSeparator,

    #[error("dataset key is not valid ASCII")]
    NotAscii,

    #[error("product key label/type suffix is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("product key suffix is missing its '#' separator")]
    MissingProductSeparator,
}
