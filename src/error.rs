use thiserror::Error;

/// Failures of the host surfaces (downloads, clipboard).
///
/// None of these are fatal: the export pipeline turns them into notices and
/// the document is never touched.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("{surface} access was denied")]
    PermissionDenied { surface: &'static str },

    #[error("download failed: {0}")]
    Download(#[source] std::io::Error),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("could not serialize document")]
    Serialize(#[from] serde_json::Error),
}

impl HostError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, HostError::PermissionDenied { .. })
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => HostError::PermissionDenied {
                surface: "download",
            },
            _ => HostError::Download(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_permission_maps_to_denied() {
        let err = HostError::from(Error::new(ErrorKind::PermissionDenied, "nope"));
        assert!(err.is_permission_denied());
        assert_eq!(err.to_string(), "download access was denied");
    }

    #[test]
    fn test_other_io_errors_are_download_failures() {
        let err = HostError::from(Error::new(ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_permission_denied());
        assert_eq!(err.to_string(), "download failed: disk full");
    }
}
