use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
