pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod init;
pub mod output;
pub mod profile;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod telemetry;
pub mod util;

pub use error::SyncError;
pub use sync::{Reconciler, SyncOutcome, UpdateOutcome};
