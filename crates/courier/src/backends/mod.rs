//! Backend contracts, availability and selection
//!
//! Two mutually independent sources of mail and calendar data:
//! - the *local* backend, a desktop client driven through automation
//!   (synchronous, assumed fast)
//! - the *remote* backend, a cloud mailbox reached over authenticated HTTP
//!   (asynchronous)

mod memory;
mod probe;
mod selector;
mod traits;

pub use memory::{InMemoryLocalClient, InMemoryRemoteClient, LocalCall, RemoteCall};
pub use probe::{AvailabilityProbe, BackendAvailability};
pub use selector::{Backend, BackendSelection, BackendSelector};
pub use traits::{LocalMailClient, RemoteMailClient};
