//! Pipeline services.

mod chain;
pub mod dispatcher;
pub mod download_registry;

pub use dispatcher::TaskDispatcher;
pub use download_registry::{DownloadRegistry, FetchOutcome, JoinRole};
