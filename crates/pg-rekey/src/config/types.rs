//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database holding the table to migrate.
    pub database: DatabaseConfig,

    /// Metadata catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// PostgreSQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Overridden by `PGREKEY_PASSWORD` when set.
    #[serde(default)]
    pub password: String,

    /// Schema containing the target table (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Metadata catalog (field and relation registry) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Keep the catalog in sync with the migrated columns (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Field records table (default: "directus_fields").
    #[serde(default = "default_fields_table")]
    pub fields_table: String,

    /// Relation records table (default: "directus_relations").
    #[serde(default = "default_relations_table")]
    pub relations_table: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fields_table: default_fields_table(),
            relations_table: default_relations_table(),
        }
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fields_table() -> String {
    "directus_fields".to_string()
}

fn default_relations_table() -> String {
    "directus_relations".to_string()
}
