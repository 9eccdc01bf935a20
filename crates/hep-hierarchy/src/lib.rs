//! DataSet/Run/SubRun/Event handles (§3.1, §4.2): entity types over
//! `hep-store-core`, a shared [`Client`] context, and the forward-cursor
//! algorithm that backs every `runs()`/`subruns()`/`events()` iteration.

mod client;
mod cursor;
mod dataset;
mod error;
mod event;
mod event_set;
mod run;
mod subrun;

pub use client::Client;
pub use cursor::Cursor;
pub use dataset::DataSet;
pub use error::Error;
pub use event::Event;
pub use event_set::EventSet;
pub use run::Run;
pub use subrun::SubRun;
