/// Database layer
///
/// - `pool`: PostgreSQL connection pool
/// - `migrations`: embedded schema migrations
///
/// Row types and queries live in the `models` module at crate root level.
pub mod migrations;
pub mod pool;
