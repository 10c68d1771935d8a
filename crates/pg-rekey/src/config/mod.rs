//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

/// Environment variable that overrides `database.password`.
pub const PASSWORD_ENV: &str = "PGREKEY_PASSWORD";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.database.password = password;
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Build a tokio-postgres config from these settings.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("pg-rekey");
        pg_config
    }

    /// `user@host:port/database` for log lines.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
database:
  host: db.internal
  database: app
  user: admin
  password: pw
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.database.ssl_mode, "disable");
        assert!(config.catalog.enabled);
        assert_eq!(config.catalog.fields_table, "directus_fields");
        assert_eq!(config.catalog.relations_table, "directus_relations");
        assert_eq!(config.database.display_target(), "admin@db.internal:5432/app");
    }

    #[test]
    fn test_from_yaml_rejects_missing_database() {
        let yaml = "database:\n  host: localhost\n  user: admin\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_catalog_section_overrides() {
        let yaml = r#"
database:
  host: localhost
  database: app
  user: admin
catalog:
  enabled: false
  fields_table: cms_fields
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(!config.catalog.enabled);
        assert_eq!(config.catalog.fields_table, "cms_fields");
        assert_eq!(config.catalog.relations_table, "directus_relations");
    }

    #[test]
    fn test_yaml_round_trip_via_file() {
        let yaml = "database:\n  host: localhost\n  database: app\n  user: admin\n";
        let config = Config::from_yaml(yaml).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), config.to_yaml().unwrap()).unwrap();
        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.database.host, "localhost");
        assert_eq!(loaded.database.user, "admin");
    }
}
