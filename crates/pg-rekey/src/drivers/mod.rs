//! Database driver implementations.
//!
//! - [`postgres`]: statement builders, connection pool and transaction session
//! - [`common`]: TLS configuration

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PgPool, PgSession, PostgresDialect};
