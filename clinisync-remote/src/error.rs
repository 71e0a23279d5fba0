//! Error types for clinisync-remote.

use thiserror::Error;

/// Failures talking to the clinic-management API.
///
/// Spreadsheet failures are reported as [`clinisync_sync::TableError`] so the
/// retry layer can classify them.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("GET {url} returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// A record field could not be converted (e.g. an unparsable date).
    #[error("{entity} {id}: invalid {field} '{value}'")]
    Field {
        entity: &'static str,
        id: String,
        field: &'static str,
        value: String,
    },
}

pub(crate) fn http_err(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => RemoteError::Status {
            url: url.to_owned(),
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => RemoteError::Transport {
            url: url.to_owned(),
            message: transport.to_string(),
        },
    }
}
