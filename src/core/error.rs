use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Cache entry corrupted: {0}")]
    CacheCorruption(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SimError {
    /// Short diagnostic reason recorded in decision records and replay metadata
    pub fn reason(&self) -> String {
        match self {
            SimError::Timeout(d) => format!("timeout after {}ms", d.as_millis()),
            SimError::Transport(msg) => format!("transport: {}", msg),
            SimError::MalformedResponse(msg) => format!("malformed response: {}", msg),
            SimError::CacheCorruption(msg) => format!("cache corruption: {}", msg),
            SimError::Configuration(msg) => format!("configuration: {}", msg),
            SimError::NotFound(msg) => format!("not found: {}", msg),
            SimError::IoError(e) => format!("io: {}", e),
            SimError::SerdeError(e) => format!("serde: {}", e),
            SimError::TomlError(e) => format!("toml: {}", e),
        }
    }

    /// Timeouts and transport faults share the same recovery path
    pub fn is_recoverable_remote(&self) -> bool {
        matches!(
            self,
            SimError::Timeout(_) | SimError::Transport(_) | SimError::MalformedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
