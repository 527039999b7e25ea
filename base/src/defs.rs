use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    IoError,
    MalformedData,
    InvalidArgument,
    ImageError,
    InconsistentState,
    UnsupportedFeature,
    DataAbsent,
    ViewMismatch,
    CorrespondenceFailure,
    DegenerateGeometry,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind, description: String) -> Self {
        Self {
            kind,
            description,
            source: None,
        }
    }

    pub fn with_source<E: StdError + Send + Sync + 'static>(
        kind: ErrorKind,
        description: String,
        source: E,
    ) -> Self {
        Self {
            kind,
            description,
            source: Some(Box::new(source)),
        }
    }

    /// Tells whether the pipeline may skip the failed item and go on.
    pub fn is_recoverable(&self) -> bool {
        use ErrorKind::*;
        matches!(self.kind, DataAbsent | ViewMismatch | CorrespondenceFailure)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:?}: {}", self.kind, self.description)?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn StdError + 'static))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait IntoResult<T> {
    fn into_result<F: FnOnce() -> String>(self, desc_fn: F) -> Result<T>;

    fn res<F: FnOnce() -> String>(self, desc_fn: F) -> Result<T>;
}

impl<T, E: StdError + Send + Sync + 'static> IntoResult<T>
    for std::result::Result<T, E>
{
    fn into_result<F: FnOnce() -> String>(self, desc_fn: F) -> Result<T> {
        self.map_err(|e| Error::with_source(ErrorKind::IoError, desc_fn(), e))
    }

    fn res<F: FnOnce() -> String>(self, desc_fn: F) -> Result<T> {
        self.into_result(desc_fn)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display_and_recoverability() {
        let err = Error::new(ErrorKind::ViewMismatch, "eye".to_string());
        assert_eq!(format!("{}", err), "ViewMismatch: eye");
        assert!(err.is_recoverable());

        let parse: std::result::Result<u32, _> = "x".parse::<u32>();
        let err = parse.res(|| "bad number".to_string()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IoError);
        assert!(!err.is_recoverable());
        assert!(err.source.is_some());
    }
}
