mod discovery;
mod error;
mod match_data;
mod quarantine;
mod rounds;
mod stats;
mod r#trait;

pub use discovery::*;
pub use error::DbError;
pub use match_data::*;
pub use quarantine::*;
pub use r#trait::*;
pub use rounds::*;
pub use stats::*;

pub type Result<T> = std::result::Result<T, error::DbError>;
