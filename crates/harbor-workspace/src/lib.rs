pub mod layout;
pub mod persist;
pub mod store;

pub use layout::{Pane, Tab, WorkspaceSnapshot};
pub use persist::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use store::{WorkspaceLimits, WorkspaceStore};
