//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Entry point addresses parse and do not share a port per transport
//! - Observability and admin values are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StaticConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;

use crate::config::schema::StaticConfig;
use crate::entrypoint::{AddressError, EntryPointAddress};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entry point {name}: {source}")]
    Address {
        name: String,
        #[source]
        source: AddressError,
    },
    #[error("entry points {first} and {second} both bind {address}")]
    DuplicateBind {
        first: String,
        second: String,
        address: String,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error("admin API is enabled without an api_key")]
    MissingAdminKey,
}

pub fn validate_config(config: &StaticConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut binds: HashMap<String, &str> = HashMap::new();

    for (name, ep) in &config.entry_points {
        match ep.address.parse::<EntryPointAddress>() {
            Ok(address) => {
                let key = format!("{}/{}", address.socket_addr(), address.transport());
                if let Some(first) = binds.insert(key.clone(), name) {
                    errors.push(ValidationError::DuplicateBind {
                        first: first.to_string(),
                        second: name.clone(),
                        address: key,
                    });
                }
            }
            Err(source) => errors.push(ValidationError::Address {
                name: name.clone(),
                source,
            }),
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EntryPointConfig;

    fn entry(address: &str) -> EntryPointConfig {
        EntryPointConfig {
            address: address.to_string(),
            http: true,
            transport: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&StaticConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = StaticConfig::default();
        config.entry_points.insert("a".into(), entry(":8080"));
        config.entry_points.insert("b".into(), entry(":8080/tcp"));
        config.entry_points.insert("c".into(), entry(":8080/udp"));
        config.entry_points.insert("d".into(), entry("bad"));
        config.observability.log_level = "loud".into();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateBind { first, second, .. } if first == "a" && second == "b")));
        assert!(errors.contains(&ValidationError::MissingAdminKey));
    }
}
