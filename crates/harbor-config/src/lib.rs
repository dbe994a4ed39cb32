//! Harbor configuration system.
//!
//! Provides TOML-based configuration with serde defaults so partial
//! configs work out of the box, plus validation and atomic writes.

pub mod schema;
pub mod toml_loader;
pub mod toml_writer;
pub mod validation;

// Re-export core types for convenience
pub use schema::{
    EditorRedirectSection, HarborConfig, SessionSection, WorkspaceSection, CONFIG_SCHEMA_VERSION,
};
pub use toml_loader::{default_config_path, load_default, load_from_path};
pub use toml_writer::{save_config, save_config_to_path};

use harbor_common::ConfigError;

/// Convenience function to load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creating a default
/// file if none exists.
pub fn load_config() -> Result<HarborConfig, ConfigError> {
    toml_loader::load_default()
}
