use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowdeckError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
    #[error("channel error: {0}")]
    Channel(String),
}
