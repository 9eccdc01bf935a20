//! Lookahead iteration and product preloading over a forward [`Cursor`]
//! (§4.3). [`SyncPrefetcher`] refills its window only when asked;
//! [`AsyncPrefetcher`] keeps a background loader task running continuously.
//! Both share a `ProductCache` so a downstream consumer (the parallel event
//! processor, chiefly) and the prefetcher agree on what's already loaded.

mod async_prefetcher;
mod error;
mod sync_prefetcher;

pub use async_prefetcher::AsyncPrefetcher;
pub use error::Error;
pub use hep_hierarchy::Cursor;
pub use sync_prefetcher::SyncPrefetcher;
