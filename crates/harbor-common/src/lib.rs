pub mod errors;
pub mod id;

pub use errors::{ConfigError, HarborError, PersistError};
pub use id::{new_id, PaneId, TabId};

pub type Result<T> = std::result::Result<T, HarborError>;
