#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Hierarchy(#[from] hep_hierarchy::Error),
    #[error(transparent)]
    Product(#[from] hep_product_store::Error),
    #[error(transparent)]
    Engine(#[from] hep_async_engine::EngineError),
    #[error("ranks disagree on which dataset to process: local {local:032x}, reduced {reduced:032x}")]
    DatasetMismatch { local: u128, reduced: u128 },
    #[error("a background task exited before process() finished: {0}")]
    WorkerGone(String),
}
