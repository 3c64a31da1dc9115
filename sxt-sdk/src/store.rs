//! Persistence seam for bearer token sets.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use sxt_api::BearerTokenSet;

/// Errors raised by a credential store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session data: {0}")]
    Corrupt(String),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Where the lifecycle manager keeps the current token set between runs.
pub trait CredentialStore: Send + Sync {
    fn save(&self, tokens: &BearerTokenSet) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<BearerTokenSet>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Stores the token set as four lines: access token, refresh token, access
/// expiry, refresh expiry.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.sxt/session.txt`
    pub fn default_location() -> Result<Self, StoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StoreError::Unavailable("could not determine home directory".into()))?;
        Ok(Self::new(home.join(".sxt").join("session.txt")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, tokens: &BearerTokenSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = format!(
            "{}\n{}\n{}\n{}\n",
            tokens.access_token,
            tokens.refresh_token,
            tokens.access_token_expires,
            tokens.refresh_token_expires
        );
        // Staged through a private sibling file and renamed into place.
        let staging = self.staging_path();
        match fs::remove_file(&staging) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&staging)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, &self.path)?;

        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<BearerTokenSet>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_session_lines(&contents).map(Some)
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_session_lines(contents: &str) -> Result<BearerTokenSet, StoreError> {
    let lines: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let [access_token, refresh_token, access_expires, refresh_expires] = lines.as_slice() else {
        return Err(StoreError::Corrupt(format!(
            "expected 4 lines, found {}",
            lines.len()
        )));
    };

    let parse_expiry = |value: &str, what: &str| {
        value
            .parse::<i64>()
            .map_err(|_| StoreError::Corrupt(format!("{} is not a number: {}", what, value)))
    };

    Ok(BearerTokenSet {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        access_token_expires: parse_expiry(access_expires, "access expiry")?,
        refresh_token_expires: parse_expiry(refresh_expires, "refresh expiry")?,
    })
}

/// Keeps the token set in memory. Counts saves, which is handy in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Option<BearerTokenSet>>,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: BearerTokenSet) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, tokens: &BearerTokenSet) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = Some(tokens.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Option<BearerTokenSet>, StoreError> {
        Ok(self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> BearerTokenSet {
        BearerTokenSet {
            access_token: "eyJhbGciOi.access".to_string(),
            refresh_token: "eyJhbGciOi.refresh".to_string(),
            access_token_expires: 1800,
            refresh_token_expires: 7200,
        }
    }

    #[test]
    fn test_file_store_four_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("session.txt"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&tokens()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            raw.lines().collect::<Vec<_>>(),
            vec!["eyJhbGciOi.access", "eyJhbGciOi.refresh", "1800", "7200"]
        );
        assert_eq!(store.load().unwrap(), Some(tokens()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_replaces_session_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        let store = FileCredentialStore::new(&path);

        // leftovers from an interrupted save are discarded
        fs::write(dir.path().join("session.txt.tmp"), "half a ses").unwrap();
        store.save(&tokens()).unwrap();

        let mut rotated = tokens();
        rotated.access_token = "eyJhbGciOi.rotated".to_string();
        store.save(&rotated).unwrap();

        assert_eq!(store.load().unwrap(), Some(rotated));
        assert!(!dir.path().join("session.txt.tmp").exists());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("session.txt"));
        store.save(&tokens()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");

        fs::write(&path, "only\nthree\nlines\n").unwrap();
        let store = FileCredentialStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));

        fs::write(&path, "a\nr\nsoon\n7200\n").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&tokens()).unwrap();
        store.save(&tokens()).unwrap();
        assert_eq!(store.saves(), 2);
        assert_eq!(store.load().unwrap(), Some(tokens()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
