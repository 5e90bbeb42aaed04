mod db;
mod error;
mod migrations;

/// Must match the last entry of `migrations::MIGRATIONS`.
pub static DB_VERSION: u64 = 3;

pub use db::SqliteDb;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
