//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: DDL/DML for each migration step
//! - [`PgPool`]: single-connection pool with TLS support
//! - [`PgSession`]: schema and catalog access inside one transaction

mod dialect;
mod pool;
mod session;

pub use dialect::PostgresDialect;
pub use pool::PgPool;
pub use session::PgSession;
