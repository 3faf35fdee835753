//! API credentials — key resolution and on-disk storage.
//!
//! Reads/writes <config>/toorpia/auth.json (0600 on Unix). A key passed
//! explicitly wins over TOORPIA_API_KEY, which wins over the saved file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// API base used when TOORPIA_API_URL is not set anywhere.
pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

/// Credentials for the toorPIA API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Long-lived API key issued per account
    pub api_key: String,
    /// API base URL (e.g. "https://api.toorpia.com")
    pub api_base: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_base: String) -> Self {
        Self { api_key, api_base }
    }

    /// Resolve credentials: explicit key > TOORPIA_API_KEY > saved file.
    ///
    /// The base URL is resolved the same way from TOORPIA_API_URL, falling
    /// back to [`DEFAULT_API_BASE`]. A missing key is an error before any
    /// network traffic happens.
    pub fn resolve(api_key: Option<String>) -> Result<Self, Error> {
        let saved = load_credentials();

        let key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| non_empty_env("TOORPIA_API_KEY"))
            .or_else(|| saved.as_ref().map(|c| c.api_key.clone()))
            .ok_or(Error::MissingApiKey)?;

        let base = non_empty_env("TOORPIA_API_URL")
            .or_else(|| saved.map(|c| c.api_base))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self::new(key, base))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the path to the credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("toorpia/auth.json"))
}

/// Load saved credentials from disk.
/// Returns None if nothing is saved or the file is invalid.
pub fn load_credentials() -> Option<ApiCredentials> {
    let path = auth_file_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save credentials to disk.
/// Creates the parent directory if needed. Sets 0600 permissions on Unix.
pub fn save_credentials(creds: &ApiCredentials) -> Result<(), Error> {
    let path = auth_file_path()
        .ok_or_else(|| Error::Io("could not determine config directory".into()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("failed to create config directory: {}", e)))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| Error::Io(format!("failed to serialize credentials: {}", e)))?;

    std::fs::write(&path, &contents)
        .map_err(|e| Error::Io(format!("failed to write credentials file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|e| Error::Io(format!("failed to set file permissions: {}", e)))?;
    }

    Ok(())
}

/// Delete saved credentials.
pub fn delete_credentials() -> Result<(), Error> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| Error::Io(format!("failed to delete credentials file: {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_roundtrip() {
        let creds = ApiCredentials {
            api_key: "test-key".into(),
            api_base: "https://api.toorpia.com".into(),
        };

        let json = serde_json::to_string_pretty(&creds).unwrap();
        let parsed: ApiCredentials = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.api_key, "test-key");
        assert_eq!(parsed.api_base, "https://api.toorpia.com");
    }

    #[test]
    fn test_auth_file_path_shape() {
        let path = auth_file_path().unwrap();
        assert!(path.to_string_lossy().contains("toorpia"));
        assert!(path.to_string_lossy().contains("auth.json"));
    }

    #[test]
    fn test_resolve_explicit_key_wins() {
        let creds = ApiCredentials::resolve(Some("  explicit-key  ".into())).unwrap();
        assert_eq!(creds.api_key, "explicit-key");
    }

    #[test]
    fn test_resolve_blank_explicit_key_is_ignored() {
        // A blank argument falls through to the other sources; with none
        // configured this must be MissingApiKey, not an empty key.
        std::env::remove_var("TOORPIA_API_KEY");
        if load_credentials().is_some() {
            return; // saved credentials on this machine, fallthrough untestable
        }
        let err = ApiCredentials::resolve(Some("   ".into())).unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[test]
    fn test_save_and_load_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");

        // Exercise the serialization shape against a scratch path; the
        // real save path lives in the user config directory.
        let creds = ApiCredentials::new("tok123".into(), "https://api.test".into());
        let json = serde_json::to_string_pretty(&creds).unwrap();
        std::fs::write(&path, &json).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: ApiCredentials = serde_json::from_str(&contents).unwrap();
        assert_eq!(loaded.api_key, "tok123");
        assert_eq!(loaded.api_base, "https://api.test");
    }
}
