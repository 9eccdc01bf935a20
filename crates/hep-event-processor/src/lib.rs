//! `ParallelEventProcessor` (§4.5 C10): an MPI-aware driver that splits one
//! dataset's events across a communicator, feeding a user callback through
//! whichever rank's local prefetch state currently holds them.

mod error;
mod loader;
mod processor;
mod roles;
mod stats;
mod transport;

pub use error::Error;
pub use processor::ParallelEventProcessor;
pub use roles::Role;
pub use stats::{Distribution, ProcessorStats};
pub use transport::Transport;
