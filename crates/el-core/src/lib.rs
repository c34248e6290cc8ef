//! el-core: Value model and snapshot data types for Elemental game logs
//!
//! Everything here is plain data. Snapshots and events are built once by a
//! loader and treated as read-only by the analysis crates.

pub mod error;
pub mod loader;
pub mod path;
pub mod snapshot;
pub mod value;

pub use error::{LoadError, ValueError};
pub use path::Path;
pub use snapshot::{Entity, EntityLevel, Event, SessionData, Snapshot};
pub use value::{Object, Value, ValueKind};
