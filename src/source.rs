//! Source resolution: turn a user-supplied identifier into a queryable handle.
//!
//! Resolution is split in two steps. [`resolve`] is pure string/filesystem logic that decides
//! *where* the data lives and records a provenance line. [`open`] then makes the location
//! queryable through the session engine, falling back to an in-memory copy for remote
//! payloads the lazy scan cannot read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::SourceConfig;
use crate::engine::{read_csv_bytes, read_parquet_bytes, QueryEngine};
use crate::error_display::user_message_from_polars;
use crate::fetch;

const DRIVE_DIRECT: &str = "https://drive.google.com/uc?export=download&id=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    /// Parquet when the extension is `parquet` (any case), CSV otherwise.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some(e) if e.eq_ignore_ascii_case("parquet") => Self::Parquet,
            _ => Self::Csv,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(String),
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// The identifier as the user gave it (empty for the default file).
    pub identifier: String,
    pub location: SourceLocation,
    pub format: SourceFormat,
    pub provenance: String,
}

/// A queryable source. Exactly one is active per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHandle {
    Local { path: PathBuf, format: SourceFormat },
    /// Remote CSV scanned from its downloaded copy at `local`.
    RemoteCsv { url: String, local: PathBuf },
    RemoteParquet { url: String, local: PathBuf },
    /// Remote payload parsed eagerly and registered as `view` in the engine.
    InMemory { url: String, view: String },
}

impl SourceHandle {
    /// Path or URL the data came from.
    pub fn origin(&self) -> String {
        match self {
            Self::Local { path, .. } => path.display().to_string(),
            Self::RemoteCsv { url, .. }
            | Self::RemoteParquet { url, .. }
            | Self::InMemory { url, .. } => url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local file",
            Self::RemoteCsv { .. } => "remote CSV",
            Self::RemoteParquet { .. } => "remote Parquet",
            Self::InMemory { .. } => "in-memory fallback",
        }
    }

    /// File stem used to name exports, e.g. `d01_s1` for `.../d01_s1.csv`.
    pub fn basename(&self) -> String {
        let origin = self.origin();
        let last = match self {
            Self::Local { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            _ => {
                let (path_part, _) = url_path_extension(&origin);
                let decoded = urlencoding::decode(&path_part)
                    .map(|s| s.into_owned())
                    .unwrap_or(path_part);
                decoded.rsplit('/').next().unwrap_or_default().to_string()
            }
        };
        let stem = Path::new(&last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cleaned: String = stem
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "data".to_string()
        } else {
            cleaned
        }
    }
}

/// An opened source ready for querying.
#[derive(Debug, Clone)]
pub struct OpenedSource {
    pub handle: SourceHandle,
    pub schema: Vec<String>,
    pub provenance: String,
    /// Set when the in-memory fallback was used; names the primary failure.
    pub fallback_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    LocalNotFound {
        path: PathBuf,
    },
    /// Both the lazy scan and the in-memory fetch failed to transfer the payload.
    RemoteFetch {
        url: String,
        primary: String,
        message: String,
    },
    /// The engine could not read a local source.
    PreviewFailed {
        origin: String,
        message: String,
    },
    /// The payload was fetched but neither path could parse it.
    FallbackFailed {
        url: String,
        primary: String,
        fallback: String,
    },
    EmptySchema {
        origin: String,
    },
    HttpUnsupported {
        url: String,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalNotFound { path } => {
                write!(f, "Data file not found: {}", path.display())
            }
            Self::RemoteFetch {
                url,
                primary,
                message,
            } => write!(
                f,
                "Could not fetch {}: {} (scan attempt: {})",
                url, message, primary
            ),
            Self::PreviewFailed { origin, message } => {
                write!(f, "Failed to read the schema of {}: {}", origin, message)
            }
            Self::FallbackFailed {
                url,
                primary,
                fallback,
            } => write!(
                f,
                "Failed to read {}. Scan: {}. In-memory fallback: {}",
                url, primary, fallback
            ),
            Self::EmptySchema { origin } => write!(f, "{} has no columns", origin),
            Self::HttpUnsupported { url } => write!(
                f,
                "Cannot open {}: remote sources are not supported in this build (enable the http feature)",
                url
            ),
        }
    }
}

impl std::error::Error for SourceError {}

/// Scheme check for `http://` and `https://`, case-insensitive.
pub fn is_remote(identifier: &str) -> bool {
    let lower = identifier.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Returns the URL path (host, query and fragment stripped) and the extension of its last segment.
pub fn url_path_extension(url: &str) -> (String, Option<String>) {
    let (_, path, _) = split_url(url);
    let path_part = path.trim_start_matches('/').to_string();
    let last_segment = path_part.rsplit('/').next().unwrap_or(&path_part);
    let ext = Path::new(last_segment)
        .extension()
        .and_then(|e| e.to_str())
        .map(String::from);
    (path_part, ext)
}

/// Split a URL into `scheme://authority`, path and the `?query#fragment` tail.
fn split_url(url: &str) -> (&str, &str, &str) {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[after_scheme..]
        .find(['/', '?', '#'])
        .map(|i| after_scheme + i)
        .unwrap_or(url.len());
    let tail_start = url[path_start..]
        .find(['?', '#'])
        .map(|i| path_start + i)
        .unwrap_or(url.len());
    (
        &url[..path_start],
        &url[path_start..tail_start],
        &url[tail_start..],
    )
}

/// `/file/d/<ID>` first, then an `id=<ID>` query parameter.
fn drive_id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"/file/d/([A-Za-z0-9_-]+)", r"[?&]id=([A-Za-z0-9_-]+)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn is_drive_host(url: &str) -> bool {
    let (authority, _, _) = split_url(url);
    let host = authority
        .rsplit("://")
        .next()
        .unwrap_or(authority)
        .to_ascii_lowercase();
    host == "drive.google.com" || host == "docs.google.com"
}

/// Rewrite Google Drive share links (`/file/d/<ID>/view`, `open?id=<ID>`, `uc?id=<ID>`) to the
/// direct-download form. Links already in `uc?export=download` form and other URLs pass through.
pub fn normalize_drive_url(url: &str) -> String {
    if !is_drive_host(url) {
        return url.to_string();
    }
    let (_, path, tail) = split_url(url);
    if path == "/uc" && tail.contains("export=download") {
        return url.to_string();
    }
    drive_id_patterns()
        .iter()
        .find_map(|re| re.captures(url).and_then(|c| c.get(1)))
        .map(|id| format!("{}{}", DRIVE_DIRECT, id.as_str()))
        .unwrap_or_else(|| url.to_string())
}

/// Percent-encode non-ASCII characters of the URL path only; query and fragment are untouched.
pub fn encode_url_path(url: &str) -> String {
    let (head, path, tail) = split_url(url);
    if path.is_ascii() {
        return url.to_string();
    }
    let mut encoded = String::with_capacity(path.len() * 3);
    let mut buf = [0u8; 4];
    for c in path.chars() {
        if c.is_ascii() {
            encoded.push(c);
        } else {
            encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    format!("{}{}{}", head, encoded, tail)
}

/// Join a base URL and a file name with exactly one `/`.
pub fn join_remote_base(base: &str, name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

/// Final URL handed to the engine.
pub fn normalize_remote_url(url: &str) -> String {
    encode_url_path(&normalize_drive_url(url.trim()))
}

/// Decide where `identifier` lives.
pub fn resolve(identifier: &str, config: &SourceConfig) -> Result<ResolvedSource, SourceError> {
    let trimmed = identifier.trim();

    if is_remote(trimmed) {
        let url = normalize_remote_url(trimmed);
        let (_, ext) = url_path_extension(&url);
        let provenance = if url == trimmed {
            format!("Data source (URL): {}", url)
        } else {
            format!("Data source (URL): {} (from {})", url, trimmed)
        };
        return Ok(ResolvedSource {
            identifier: trimmed.to_string(),
            location: SourceLocation::Remote(url),
            format: SourceFormat::from_extension(ext.as_deref()),
            provenance,
        });
    }

    let name = if trimmed.is_empty() {
        config.default_file.as_str()
    } else {
        trimmed
    };
    let path = config.data_dir_path().join(name);
    let format = SourceFormat::from_extension(path.extension().and_then(|e| e.to_str()));
    if path.is_file() {
        let provenance = if trimmed.is_empty() {
            format!("Data source: {}", path.display())
        } else {
            format!("Data source (local file): {}", path.display())
        };
        return Ok(ResolvedSource {
            identifier: trimmed.to_string(),
            location: SourceLocation::Local(path),
            format,
            provenance,
        });
    }

    match config.remote_base.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(base) => {
            let url = normalize_remote_url(&join_remote_base(base.trim(), name));
            tracing::info!(name, url = %url, "local file not found, using remote base");
            Ok(ResolvedSource {
                identifier: trimmed.to_string(),
                location: SourceLocation::Remote(url.clone()),
                format,
                provenance: format!(
                    "Data source (remote base): {} ({} not found locally)",
                    url,
                    path.display()
                ),
            })
        }
        None => Err(SourceError::LocalNotFound { path }),
    }
}

/// Make a resolved source queryable and read its schema.
pub fn open(
    resolved: &ResolvedSource,
    engine: &mut QueryEngine,
) -> Result<OpenedSource, SourceError> {
    match &resolved.location {
        SourceLocation::Local(path) => {
            let handle = SourceHandle::Local {
                path: path.clone(),
                format: resolved.format,
            };
            let schema = engine
                .preview_schema(&handle)
                .map_err(|e| SourceError::PreviewFailed {
                    origin: handle.origin(),
                    message: user_message_from_polars(&e),
                })?;
            finish(handle, schema, resolved, None)
        }
        SourceLocation::Remote(url) => open_remote(url, resolved, engine),
    }
}

fn finish(
    handle: SourceHandle,
    schema: Vec<String>,
    resolved: &ResolvedSource,
    fallback_note: Option<String>,
) -> Result<OpenedSource, SourceError> {
    if schema.is_empty() {
        return Err(SourceError::EmptySchema {
            origin: handle.origin(),
        });
    }
    tracing::info!(
        origin = %handle.origin(),
        kind = handle.kind(),
        columns = schema.len(),
        "source opened"
    );
    Ok(OpenedSource {
        handle,
        schema,
        provenance: resolved.provenance.clone(),
        fallback_note,
    })
}

fn open_remote(
    url: &str,
    resolved: &ResolvedSource,
    engine: &mut QueryEngine,
) -> Result<OpenedSource, SourceError> {
    if !cfg!(feature = "http") {
        return Err(SourceError::HttpUnsupported {
            url: url.to_string(),
        });
    }
    let failure = match scan_remote(url, resolved.format, engine) {
        Ok((handle, schema)) => return finish(handle, schema, resolved, None),
        Err(failure) => failure,
    };
    let primary = failure.message;
    tracing::warn!(url, error = %primary, "remote scan failed, trying in-memory fallback");

    // A payload that was downloaded but not scannable is parsed from the same copy.
    let bytes = match failure.download {
        Some(temp) => std::fs::read(&temp).map_err(|e| e.to_string()),
        None => fetch::fetch_bytes(url, engine.http_timeout()).map_err(|e| e.to_string()),
    }
    .map_err(|message| SourceError::RemoteFetch {
        url: url.to_string(),
        primary: primary.clone(),
        message,
    })?;
    open_in_memory(url, bytes, resolved, primary, engine)
}

/// Secondary path: parse the whole payload eagerly and register it as a named view.
pub(crate) fn open_in_memory(
    url: &str,
    bytes: Vec<u8>,
    resolved: &ResolvedSource,
    primary: String,
    engine: &mut QueryEngine,
) -> Result<OpenedSource, SourceError> {
    let fallback_failed = |message: String| SourceError::FallbackFailed {
        url: url.to_string(),
        primary: primary.clone(),
        fallback: message,
    };
    let parsed = match resolved.format {
        SourceFormat::Csv => read_csv_bytes(bytes),
        SourceFormat::Parquet => read_parquet_bytes(bytes),
    };
    let df = parsed.map_err(|e| fallback_failed(user_message_from_polars(&e)))?;

    let view = engine.next_view_name();
    engine.register_view(&view, df);
    let handle = SourceHandle::InMemory {
        url: url.to_string(),
        view,
    };
    let schema = match engine.preview_schema(&handle) {
        Ok(schema) => schema,
        Err(e) => {
            engine.release(&handle);
            return Err(fallback_failed(user_message_from_polars(&e)));
        }
    };
    let note = format!("Loaded into memory after the scan failed: {}", primary);
    finish(handle, schema, resolved, Some(note))
}

/// Why the lazy scan failed, keeping the downloaded copy when the transfer itself worked.
struct ScanFailure {
    message: String,
    download: Option<tempfile::TempPath>,
}

/// Primary path: download to a temp file, scan lazily, read the one-row preview.
fn scan_remote(
    url: &str,
    format: SourceFormat,
    engine: &mut QueryEngine,
) -> Result<(SourceHandle, Vec<String>), ScanFailure> {
    let temp = fetch::download_to_temp(url, engine.http_timeout(), format.extension()).map_err(
        |e| ScanFailure {
            message: e.to_string(),
            download: None,
        },
    )?;
    let local = temp.to_path_buf();
    let handle = match format {
        SourceFormat::Csv => SourceHandle::RemoteCsv {
            url: url.to_string(),
            local,
        },
        SourceFormat::Parquet => SourceHandle::RemoteParquet {
            url: url.to_string(),
            local,
        },
    };
    match engine.preview_schema(&handle) {
        Ok(schema) => {
            engine.adopt_download(temp);
            Ok((handle, schema))
        }
        Err(e) => Err(ScanFailure {
            message: user_message_from_polars(&e),
            download: Some(temp),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> SourceConfig {
        SourceConfig {
            data_dir: Some(dir.display().to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_drive_links_normalize_to_same_url() {
        let view = "https://drive.google.com/file/d/1AbC_d-9/view?usp=sharing";
        let open = "https://drive.google.com/open?id=1AbC_d-9";
        let uc = "https://drive.google.com/uc?id=1AbC_d-9";
        let expected = "https://drive.google.com/uc?export=download&id=1AbC_d-9";
        assert_eq!(normalize_drive_url(view), expected);
        assert_eq!(normalize_drive_url(open), expected);
        assert_eq!(normalize_drive_url(uc), expected);
        assert_eq!(normalize_drive_url(expected), expected);
    }

    #[test]
    fn test_direct_download_link_passes_through_unchanged() {
        let url = "https://drive.google.com/uc?id=XYZ&export=download";
        assert_eq!(normalize_drive_url(url), url);
    }

    #[test]
    fn test_non_drive_urls_untouched() {
        let url = "https://example.org/file/d/123/view";
        assert_eq!(normalize_drive_url(url), url);
    }

    #[test]
    fn test_encode_only_path() {
        let url = "https://example.org/data/d01銅_s1.csv?q=銅#frag";
        assert_eq!(
            encode_url_path(url),
            "https://example.org/data/d01%E9%8A%85_s1.csv?q=銅#frag"
        );
        let ascii = "https://example.org/a%20b.csv?x=1";
        assert_eq!(encode_url_path(ascii), ascii);
    }

    #[test]
    fn test_extension_from_path_only() {
        let (path, ext) = url_path_extension("https://x.org/dir/f.PARQUET?dl=1");
        assert_eq!(path, "dir/f.PARQUET");
        assert_eq!(
            SourceFormat::from_extension(ext.as_deref()),
            SourceFormat::Parquet
        );
        let (_, ext) = url_path_extension("https://x.org/get?file=a.parquet");
        assert_eq!(SourceFormat::from_extension(ext.as_deref()), SourceFormat::Csv);
    }

    #[test]
    fn test_join_remote_base_single_slash() {
        assert_eq!(join_remote_base("https://h/d/", "/a.csv"), "https://h/d/a.csv");
        assert_eq!(join_remote_base("https://h/d", "a.csv"), "https://h/d/a.csv");
    }

    #[test]
    fn test_remote_scheme_case_insensitive() {
        let r = resolve("HTTPS://example.org/x.csv", &SourceConfig::default()).unwrap();
        assert!(matches!(r.location, SourceLocation::Remote(_)));
        assert_eq!(r.format, SourceFormat::Csv);
    }

    #[test]
    fn test_resolve_local_and_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "a\n1\n").unwrap();
        fs::write(dir.path().join("other.csv"), "a\n1\n").unwrap();
        let cfg = config_in(dir.path());

        let r = resolve("", &cfg).unwrap();
        assert_eq!(r.location, SourceLocation::Local(dir.path().join("data.csv")));

        let r = resolve("other.csv", &cfg).unwrap();
        assert_eq!(r.location, SourceLocation::Local(dir.path().join("other.csv")));
        assert!(r.provenance.contains("other.csv"));
    }

    #[test]
    fn test_missing_local_without_remote_base() {
        let dir = TempDir::new().unwrap();
        let err = resolve("nope.csv", &config_in(dir.path())).unwrap_err();
        assert!(matches!(err, SourceError::LocalNotFound { .. }));
    }

    #[test]
    fn test_missing_local_falls_back_to_remote_base() {
        let dir = TempDir::new().unwrap();
        let cfg = SourceConfig {
            remote_base: Some("https://mirror.example.org/sets/".to_string()),
            ..config_in(dir.path())
        };
        let r = resolve("d02玉_s1.csv", &cfg).unwrap();
        assert_eq!(
            r.location,
            SourceLocation::Remote(
                "https://mirror.example.org/sets/d02%E7%8E%89_s1.csv".to_string()
            )
        );
        assert!(r.provenance.contains("not found locally"));
    }

    #[test]
    fn test_open_local_reads_schema() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "id,name\n1,bronze\n2,jade\n").unwrap();
        let resolved = resolve("", &config_in(dir.path())).unwrap();
        let mut engine = QueryEngine::new(false, 1000, std::time::Duration::from_secs(1));
        let opened = open(&resolved, &mut engine).unwrap();
        assert_eq!(opened.schema, vec!["id", "name"]);
        assert!(opened.fallback_note.is_none());
        assert_eq!(opened.handle.basename(), "data");
    }

    fn remote(url: &str) -> ResolvedSource {
        resolve(url, &SourceConfig::default()).unwrap()
    }

    #[test]
    fn test_in_memory_fallback_registers_a_view() {
        let url = "https://example.org/data/d01_s1.csv";
        let mut engine = QueryEngine::new(false, 1000, std::time::Duration::from_secs(1));
        let opened = open_in_memory(
            url,
            b"id,name\n1,bronze\n2,jade\n".to_vec(),
            &remote(url),
            "truncated row".to_string(),
            &mut engine,
        )
        .unwrap();

        assert!(matches!(
            &opened.handle,
            SourceHandle::InMemory { view, .. } if view == "remote_0"
        ));
        assert_eq!(opened.schema, vec!["id", "name"]);
        assert!(opened.fallback_note.unwrap().contains("truncated row"));
        assert_eq!(opened.handle.basename(), "d01_s1");
        assert!(engine.scan(&opened.handle).is_ok());
    }

    #[test]
    fn test_in_memory_fallback_failure_keeps_both_messages() {
        let url = "https://example.org/data/d01.parquet";
        let mut engine = QueryEngine::new(false, 1000, std::time::Duration::from_secs(1));
        let err = open_in_memory(
            url,
            b"not parquet".to_vec(),
            &remote(url),
            "bad magic".to_string(),
            &mut engine,
        )
        .unwrap_err();

        match err {
            SourceError::FallbackFailed {
                url: failed,
                primary,
                fallback,
            } => {
                assert_eq!(failed, url);
                assert_eq!(primary, "bad magic");
                assert!(!fallback.is_empty());
            }
            other => panic!("expected FallbackFailed, got {:?}", other),
        }
        assert_eq!(engine.next_view_name(), "remote_0");
    }

    #[test]
    fn test_basename_from_encoded_url() {
        let handle = SourceHandle::RemoteCsv {
            url: "https://h/x/d01%E9%8A%85_s1.csv?raw=1".to_string(),
            local: PathBuf::from("/tmp/x.csv"),
        };
        assert_eq!(handle.basename(), "d01銅_s1");
    }
}
