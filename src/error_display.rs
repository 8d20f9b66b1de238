//! User-facing error message formatting.
//!
//! Matches on typed errors (PolarsError variants, io::ErrorKind, the crate's own error enums)
//! instead of parsing strings.

use polars::prelude::PolarsError;
use std::io;

use crate::fetch::FetchError;
use crate::query::QueryError;
use crate::source::SourceError;

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. The source schema may have changed; reopen it.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Row out of bounds: {}", msg),
        PE::ComputeError(msg) => crate::query::sanitize_query_error(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            return match context {
                Some(_) => format!("I/O error: {}", msg),
                None => msg,
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types along its cause chain.
pub fn user_message_from_report(report: &color_eyre::eyre::Report) -> String {
    for cause in report.chain() {
        if let Some(e) = cause.downcast_ref::<SourceError>() {
            return e.to_string();
        }
        if let Some(e) = cause.downcast_ref::<QueryError>() {
            return e.to_string();
        }
        if let Some(e) = cause.downcast_ref::<FetchError>() {
            return e.to_string();
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return user_message_from_polars(pe);
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return user_message_from_io(io_err, None);
        }
    }

    let display = report.to_string();
    display
        .lines()
        .next()
        .map(str::trim)
        .unwrap_or("An error occurred")
        .to_string()
}
