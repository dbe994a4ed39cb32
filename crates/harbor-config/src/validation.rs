//! Configuration validation.
//!
//! Validates numeric ranges, collecting all errors into one message.

use crate::schema::HarborConfig;
use harbor_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HarborConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(&mut errors, "workspace.max_panes", config.workspace.max_panes, 1, 16);
    validate_range(&mut errors, "workspace.max_tabs", config.workspace.max_tabs, 1, 64);

    validate_range(
        &mut errors,
        "session.suggest_debounce_ms",
        config.session.suggest_debounce_ms as usize,
        0,
        5_000,
    );
    validate_range(
        &mut errors,
        "session.integration_probe_secs",
        config.session.integration_probe_secs as usize,
        1,
        60,
    );
    validate_range(&mut errors, "session.history_cap", config.session.history_cap, 1, 10_000);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: usize, min: usize, max: usize) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}
