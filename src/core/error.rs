use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    /// A dump line with the wrong field count or an undecodable body
    MalformedRecord,
    /// A lookup that has no answer, e.g. an edition with no mapped work
    NotFound,
    TableAlreadyExists,
    MissingInputFile,
    RedirectCycle,
    Corrupted,
    Database,
    InvalidArgument,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn malformed(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::MalformedRecord, context.into())
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_cycle(&self) -> bool {
        self.kind == ErrorKind::RedirectCycle
    }

    /// Errors that end the run rather than being skipped line by line.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::MalformedRecord | ErrorKind::NotFound | ErrorKind::RedirectCycle
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::MalformedRecord,
            context: format!("JSON error: {}", err),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error {
            kind: ErrorKind::Database,
            context: format!("SQLite error: {}", err),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("Config error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("Pattern error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
