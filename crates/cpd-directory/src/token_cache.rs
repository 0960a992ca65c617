//! On-disk OAuth2 token cache keyed by the target domain.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::auth::Token;
use crate::error::Result;

/// A single cached token file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache file for a migration to `new_domain`:
    /// `<dir>/<query-escaped "<prefix>-<new_domain>.json">`.
    pub fn for_domain(dir: impl AsRef<Path>, prefix: &str, new_domain: &str) -> Self {
        let file_name = format!("{}-{}.json", prefix, new_domain);
        let escaped: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
        Self::new(dir.as_ref().join(escaped))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<Token>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token: Token = serde_json::from_str(&content)?;
        Ok(Some(token))
    }

    /// Write the token, creating the cache directory owner-only.
    pub fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)?;
        }
        let json = serde_json::to_string(token)?;
        write_private_file(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), "Saved credential file");
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_token() -> Token {
        Token {
            access_token: "ya29.access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[test]
    fn test_file_name_is_keyed_by_new_domain() {
        let cache = TokenCache::for_domain("/home/op/.credentials", "changeprimarydomain", "new.com");
        assert_eq!(
            cache.path(),
            Path::new("/home/op/.credentials/changeprimarydomain-new.com.json")
        );
    }

    #[test]
    fn test_file_name_is_query_escaped() {
        let cache = TokenCache::for_domain("/tmp", "changeprimarydomain", "a b/c");
        assert_eq!(
            cache.path(),
            Path::new("/tmp/changeprimarydomain-a+b%2Fc.json")
        );
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::for_domain(dir.path(), "changeprimarydomain", "new.com");
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::for_domain(dir.path().join("nested"), "changeprimarydomain", "new.com");
        let token = sample_token();

        cache.save(&token).unwrap();
        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, token.access_token);
        assert_eq!(loaded.refresh_token, token.refresh_token);
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("creds");
        TokenCache::for_domain(&cache_dir, "changeprimarydomain", "new.com")
            .save(&sample_token())
            .unwrap();

        let mode = fs::metadata(&cache_dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
