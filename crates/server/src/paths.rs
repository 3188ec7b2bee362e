//! Confinement of client-supplied paths.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Resolve an existing file or folder named in a request.
///
/// The path must exist and, after resolving symlinks and `..`, lie inside the
/// upload or output directory.
pub fn resolve_request_path(state: &AppState, raw: &str) -> ApiResult<PathBuf> {
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request("Path must not be empty"));
    }

    let canonical = PathBuf::from(raw).canonicalize().map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::not_found(format!("File not found: {}", raw)),
        _ => ApiError::internal(format!("Cannot resolve {}: {}", raw, e)),
    })?;

    if state.allowed_roots().iter().any(|root| canonical.starts_with(root)) {
        Ok(canonical)
    } else {
        log::warn!("Rejected path outside working directories: {}", raw);
        Err(ApiError::forbidden(format!("Access denied: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::http::StatusCode;

    fn state(root: &std::path::Path) -> AppState {
        AppState::new(ServerConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("results"),
            ..ServerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_paths_inside_roots_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let file = dir.path().join("uploads/a.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let resolved = resolve_request_path(&state, file.to_str().unwrap()).unwrap();
        assert_eq!(resolved, file.canonicalize().unwrap());
    }

    #[test]
    fn test_escaping_paths_are_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        let sneaky = dir.path().join("uploads/../secret.txt");
        let err = resolve_request_path(&state, sneaky.to_str().unwrap()).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_missing_and_empty_paths() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let missing = dir.path().join("uploads/nope.docx");
        let err = resolve_request_path(&state, missing.to_str().unwrap()).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(resolve_request_path(&state, " ").unwrap_err().status, StatusCode::BAD_REQUEST);
    }
}
