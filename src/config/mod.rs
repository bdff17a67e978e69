//! Configuration loading and management

use crate::core::error::{ConfigError, ThisError, ThisResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings of a single entity service
///
/// Only plain data lives here so settings can be loaded from YAML. Relation
/// rules, validators, hooks and ports are attached through
/// [`DatabaseServiceBuilder`](crate::service::DatabaseServiceBuilder).
///
/// # Example
///
/// ```yaml
/// name: users
/// id_field: _id
/// fields: [_id, name, address.city]
/// page_size: 10
/// max_page_size: 100
/// max_limit: 0
/// soft_delete: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServiceSettings {
    /// Collection name; also the cache namespace and invalidation channel suffix
    #[validate(length(min = 1))]
    pub name: String,

    /// Name of the identity field
    #[serde(default = "default_id_field")]
    #[validate(length(min = 1))]
    pub id_field: String,

    /// Default allow-list of exposable dotted paths (`None` = no restriction)
    #[serde(default)]
    pub fields: Option<Vec<String>>,

    /// Default page size of `list`
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub page_size: usize,

    /// Upper bound on `pageSize` (0 = unbounded)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Upper bound on `limit` (0 = unbounded)
    #[serde(default)]
    pub max_limit: usize,

    /// Enable the deletion-marker mode
    #[serde(default)]
    pub soft_delete: bool,

    /// Field holding the deletion marker; `null` or absent means "not deleted"
    #[serde(default = "default_soft_delete_field")]
    #[validate(length(min = 1))]
    pub soft_delete_field: String,

    /// Delay between connection attempts at startup
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_id_field() -> String {
    "_id".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_soft_delete_field() -> String {
    "deleted_at".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl ServiceSettings {
    /// Settings with all defaults for the given collection name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: default_id_field(),
            fields: None,
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_limit: 0,
            soft_delete: false,
            soft_delete_field: default_soft_delete_field(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file(path: &str) -> ThisResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|err| match err {
            ThisError::Config(ConfigError::ParseError { message, .. }) => {
                ThisError::Config(ConfigError::ParseError {
                    file: Some(path.to_string()),
                    message,
                })
            }
            other => other,
        })
    }

    /// Load settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> ThisResult<Self> {
        Self::parse(yaml)
    }

    fn parse(yaml: &str) -> ThisResult<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Channel name broadcast on every mutation
    pub fn cache_clean_channel(&self) -> String {
        format!("cache.clean.{}", self.name)
    }

    /// Cache key pattern covering every entry of this collection
    pub fn cache_namespace_pattern(&self) -> String {
        format!("{}.**", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ServiceSettings::from_yaml_str("name: users").unwrap();

        assert_eq!(settings, ServiceSettings::new("users"));
        assert_eq!(settings.id_field, "_id");
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.max_page_size, 100);
        assert_eq!(settings.max_limit, 0);
        assert!(!settings.soft_delete);
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
name: posts
id_field: id
fields: [id, title, author]
page_size: 25
max_limit: 50
soft_delete: true
"#;
        let settings = ServiceSettings::from_yaml_str(yaml).unwrap();

        assert_eq!(settings.id_field, "id");
        assert_eq!(settings.fields.as_deref().map(<[String]>::len), Some(3));
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.max_limit, 50);
        assert!(settings.soft_delete);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = ServiceSettings::from_yaml_str("name: ''").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = ServiceSettings::from_yaml_str("name: users\npage_size: 0").unwrap_err();
        assert!(matches!(
            err,
            ThisError::Config(ConfigError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_namespace_derivation() {
        let settings = ServiceSettings::new("users");
        assert_eq!(settings.cache_clean_channel(), "cache.clean.users");
        assert_eq!(settings.cache_namespace_pattern(), "users.**");
    }
}
