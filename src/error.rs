use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    FailedToOpen(String),
    InvalidVersion(String),
    AlreadyOpen,
    LogInvalid,
    AlreadyPlaying,
    AlreadyRecording,
    FailedToSubscribe(String),
    InvalidTopic(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Sql(err) => write!(f, "sql error: {err}"),
            Error::FailedToOpen(path) => write!(f, "failed to open log file [{path}]"),
            Error::InvalidVersion(version) => {
                write!(f, "log file version [{version}] is unsupported")
            }
            Error::AlreadyOpen => write!(f, "a log file is already open"),
            Error::LogInvalid => write!(f, "no valid log file is open"),
            Error::AlreadyPlaying => write!(f, "a playback handle is still running"),
            Error::AlreadyRecording => write!(f, "recording is already in progress"),
            Error::FailedToSubscribe(topic) => write!(f, "failed to subscribe to [{topic}]"),
            Error::InvalidTopic(topic) => write!(f, "invalid topic name [{topic}]"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Sql(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::Sql(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
