pub mod changes;
pub mod entries;
pub mod error;
pub mod events;
pub mod journal;
pub mod policy;
pub mod registry;
pub mod roles;
pub mod types;

pub use error::{CoreError, RegistryError};
pub use registry::{Registry, RegistryConfig};
pub use types::{Address, ChangeId, Entry, EntryState, PendingChange, Role};
