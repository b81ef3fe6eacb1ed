use thiserror::Error;

/// Transport-level failures, each mapping directly to an HTTP status per §6.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("malformed request line")]
    BadRequest,

    #[error("unsupported method")]
    MethodNotAllowed,

    #[error("unknown path")]
    NotFound,
}

impl RequestError {
    pub fn status_line(self) -> &'static str {
        match self {
            RequestError::BadRequest => "HTTP/1.0 400 Bad Request",
            RequestError::MethodNotAllowed => "HTTP/1.0 405 Method Not Allowed",
            RequestError::NotFound => "HTTP/1.0 404 Not Found",
        }
    }
}
