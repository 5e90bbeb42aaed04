pub mod archive;
pub mod db;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod transport;
pub mod urls;
pub mod validator;

pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

pub use pipeline::{StageStats, run_all};
pub use transport::{FetchStats, Fetcher};
