//! Error types and result definitions for fan-out operations.
//!
//! Provides an error system with classification, aggregation, and captured diagnostic metadata
//! for batches of concurrent producers. The [`FanOutError`] type supports single errors, errors
//! with additional detail, and multiple aggregated errors collected from several producers.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for fan-out operations using [`FanOutError`] as the error type.
pub type FanOutResult<T> = Result<T, FanOutError>;

/// Detailed payload stored for single [`FanOutError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for fan-out operations.
///
/// [`FanOutError`] can represent a single failure of one producer, or an aggregate of the
/// failures observed while coordinating a whole batch.
#[derive(Debug, Clone)]
pub struct FanOutError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    ///
    /// This variant is mainly useful to capture failures of multiple producers.
    Many {
        errors: Vec<FanOutError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur while running a batch.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Producer Errors
    WorkFailed,
    WorkerPanic,

    // Coordination Errors
    ProtocolViolation,
    ConsumerGone,
    InvalidState,

    // Outbound Request Errors
    InvalidRequest,
    RequestTimedOut,
    RequestFailed,

    // Configuration Errors
    ConfigError,

    // Unknown / Uncategorized
    Unknown,

    // Special error kind used by tests that inject failures via fail points.
    #[cfg(feature = "failpoints")]
    WithNoRetry,
}

impl FanOutError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the static description of this error.
    ///
    /// For multiple errors, returns the description of the first one.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { ref errors, .. } => errors.first().and_then(|e| e.description()),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates a [`FanOutError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        FanOutError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for FanOutError {
    fn eq(&self, other: &FanOutError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)?;
                write_backtrace(payload.backtrace.as_ref(), f, 1)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                } else {
                    for (index, error) in errors.iter().enumerate() {
                        let rendered = format!("{error}");
                        let mut lines = rendered.lines();
                        if let Some(first_line) = lines.next() {
                            write!(f, "\n  {}. {}", index + 1, first_line)?;
                        } else {
                            write!(f, "\n  {}.", index + 1)?;
                        }

                        for line in lines {
                            if line.is_empty() {
                                write!(f, "\n     ")?;
                            } else {
                                write!(f, "\n     {line}")?;
                            }
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for FanOutError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`FanOutError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for FanOutError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> FanOutError {
        FanOutError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`FanOutError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for FanOutError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> FanOutError {
        FanOutError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`FanOutError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for FanOutError
where
    E: Into<FanOutError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> FanOutError {
        let location = Location::caller();

        let mut errors: Vec<FanOutError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        FanOutError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`fanout_config::shared::ValidationError`] to [`FanOutError`] with
/// [`ErrorKind::ConfigError`].
impl From<fanout_config::shared::ValidationError> for FanOutError {
    #[track_caller]
    fn from(err: fanout_config::shared::ValidationError) -> FanOutError {
        let detail = err.to_string();
        let source = Arc::new(err);
        FanOutError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid fan-out configuration"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout_error;

    #[test]
    fn test_single_error_exposes_kind_and_detail() {
        let err = fanout_error!(ErrorKind::WorkFailed, "Work failed", "item 3 exploded");

        assert_eq!(err.kind(), ErrorKind::WorkFailed);
        assert_eq!(err.kinds(), vec![ErrorKind::WorkFailed]);
        assert_eq!(err.description(), Some("Work failed"));
        assert_eq!(err.detail(), Some("item 3 exploded"));
    }

    #[test]
    fn test_single_element_vec_is_unwrapped() {
        let err: FanOutError = vec![fanout_error!(ErrorKind::WorkerPanic, "Panic")].into();

        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
        assert!(!err.to_string().starts_with("[Many]"));
    }

    #[test]
    fn test_many_errors_are_aggregated() {
        let err: FanOutError = vec![
            fanout_error!(ErrorKind::ProtocolViolation, "Send after close"),
            fanout_error!(ErrorKind::WorkerPanic, "Panic", "boom"),
        ]
        .into();

        assert_eq!(
            err.kinds(),
            vec![ErrorKind::ProtocolViolation, ErrorKind::WorkerPanic]
        );
        assert_eq!(err.detail(), Some("boom"));
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
        assert!(err.backtrace().is_none());
    }

    #[test]
    fn test_source_is_preserved() {
        let io = std::io::Error::other("disk on fire");
        let err = fanout_error!(ErrorKind::WorkFailed, "Work failed", source: io);

        let source = error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_equality_compares_kinds() {
        let a = fanout_error!(ErrorKind::RequestTimedOut, "Timed out", "a");
        let b = fanout_error!(ErrorKind::RequestTimedOut, "Timed out", "b");
        let c = fanout_error!(ErrorKind::RequestFailed, "Failed");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
