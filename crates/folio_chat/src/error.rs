#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Chat(#[from] folio_chat::Error),
    #[error("{0}")]
    Reply(String),
    #[error("the reply was cancelled")]
    Cancelled,
    #[error("nothing to send: the prompt is empty")]
    EmptyPrompt,
    #[error("invalid session id `{0}`: use letters, digits, `-` or `_`")]
    InvalidSession(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    EnvVar(#[from] std::env::VarError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),
    #[error(transparent)]
    ConfigFile(#[from] config_file::ConfigFileError),
}
