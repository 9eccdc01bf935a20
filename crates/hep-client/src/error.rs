#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] hep_config::Error),
    #[error(transparent)]
    Store(#[from] hep_store_core::Error),
    #[error(transparent)]
    Hierarchy(#[from] hep_hierarchy::Error),
    #[error("failed to start the async engine: {0}")]
    Engine(#[source] std::io::Error),
}
