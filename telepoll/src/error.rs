use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not connected to {host}:{port}")]
    NotConnected { host: String, port: u16 },
    #[error("connection busy with an outstanding request")]
    ConnectionBusy,
    #[error("reply has no 'ok' field")]
    UnexpectedReply,
    #[error("server returned error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Error: Send, Sync);

    #[test]
    fn test_display() {
        let e = Error::NotConnected {
            host: "api.telegram.org".into(),
            port: 443,
        };
        assert_eq!(e.to_string(), "not connected to api.telegram.org:443");

        let e = Error::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
        };
        assert_eq!(
            e.to_string(),
            "server returned error 400: Bad Request: chat not found"
        );
    }
}
