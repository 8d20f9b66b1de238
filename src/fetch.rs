//! HTTP transfer of remote payloads, either to a temp file or into memory.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Built without the `http` feature.
    Unsupported,
    /// Connection, DNS or TLS failure.
    Transport(String),
    /// Server answered with an error status.
    Status(u16, String),
    /// The response body could not be read or stored.
    Io(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "remote sources are not supported in this build"),
            Self::Transport(msg) => write!(f, "download failed: {}", msg),
            Self::Status(code, text) => write!(f, "server returned {} {}", code, text),
            Self::Io(msg) => write!(f, "download failed while reading the body: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(feature = "http")]
fn get(url: &str, timeout: Duration) -> Result<ureq::Response, FetchError> {
    match ureq::get(url).timeout(timeout).call() {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(code, response)) => {
            Err(FetchError::Status(code, response.status_text().to_string()))
        }
        Err(ureq::Error::Transport(t)) => Err(FetchError::Transport(t.to_string())),
    }
}

/// Stream the response body into a temp file carrying `extension`, deleted when the returned
/// path is dropped.
#[cfg(feature = "http")]
pub fn download_to_temp(
    url: &str,
    timeout: Duration,
    extension: &str,
) -> Result<tempfile::TempPath, FetchError> {
    let mut temp = tempfile::Builder::new()
        .prefix("csvflow-")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .map_err(|e| FetchError::Io(e.to_string()))?;
    let response = get(url, timeout)?;
    std::io::copy(&mut response.into_reader(), &mut temp)
        .map_err(|e| FetchError::Io(e.to_string()))?;
    Ok(temp.into_temp_path())
}

/// Read the whole response body into memory.
#[cfg(feature = "http")]
pub fn fetch_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    use std::io::Read;

    let response = get(url, timeout)?;
    let mut buf = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut buf)
        .map_err(|e| FetchError::Io(e.to_string()))?;
    Ok(buf)
}

#[cfg(not(feature = "http"))]
pub fn download_to_temp(
    _url: &str,
    _timeout: Duration,
    _extension: &str,
) -> Result<tempfile::TempPath, FetchError> {
    Err(FetchError::Unsupported)
}

#[cfg(not(feature = "http"))]
pub fn fetch_bytes(_url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Unsupported)
}
