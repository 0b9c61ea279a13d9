use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("model error: {0}")]
    Model(#[from] story_model::ModelError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transformation error: {0}")]
    Transform(#[from] TransformError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure to apply a single transformation. The batch applier logs these and keeps
/// the previous text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("transformation selector is empty")]
    EmptySelector,

    #[error("selector `{0}` not found in content")]
    SelectorNotFound(String),

    #[error("selector `{0}` does not fall on a character boundary")]
    InvalidBoundary(String),
}
