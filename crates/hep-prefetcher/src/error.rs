#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Hierarchy(#[from] hep_hierarchy::Error),
    #[error(transparent)]
    Product(#[from] hep_product_store::Error),
}
