use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A controller without a usable base path was handed to the server.
    #[error("invalid controller: {0}")]
    InvalidController(String),
    #[cfg_attr(not(feature = "mail_http"), allow(dead_code))]
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to bind socket: {0}")]
    SocketBind(String),
    #[error("server stopped: {0}")]
    Serve(String),
}

/// I/O failures while serving; bind failures are mapped to `SocketBind` where they happen.
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Serve(value.to_string())
    }
}

#[cfg(feature = "mail_http")]
impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Mail(format!("{:?}", value))
    }
}
