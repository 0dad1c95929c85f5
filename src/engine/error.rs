use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Missing or malformed input. No mutation performed.
    Validation(&'static str),
    /// Unknown booking/room id. The str names the entity kind.
    NotFound(&'static str, Ulid),
    /// Caller lacks the required role or ownership.
    Forbidden(&'static str),
    /// Invalid state transition (check-in without verification, mutating an
    /// approved verification, paying a cancelled booking, ...).
    Conflict(&'static str),
    LimitExceeded(&'static str),
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "{msg}"),
            EngineError::Conflict(msg) => write!(f, "{msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
