//! Durable session persistence: OS keychain or a private JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jotter_core::auth::{AuthError, AuthResult, AuthSession, SessionPersistence};
use jotter_core::config::SessionStorageKind;
use keyring::Entry;

const KEYRING_SERVICE_NAME: &str = "jotter";
const KEYRING_USERNAME: &str = "supabase_session";
const SESSION_FILE: &str = "session.json";

/// Whether `keyring` was built with a persistent OS backend for this target.
/// Without one it falls back to an in-process mock that forgets everything.
const NATIVE_KEYRING: bool = cfg!(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
    target_os = "linux",
));

#[derive(Clone)]
pub enum SessionStorage {
    Keyring(KeyringSessionStore),
    File(FileSessionStore),
}

impl SessionStorage {
    pub fn for_kind(kind: SessionStorageKind) -> AuthResult<Self> {
        match kind {
            SessionStorageKind::Keyring if NATIVE_KEYRING => Ok(Self::Keyring(KeyringSessionStore)),
            SessionStorageKind::Keyring => Err(AuthError::SecureStorage(
                "no OS keychain on this platform; use the file session store".to_string(),
            )),
            SessionStorageKind::File => {
                let store = FileSessionStore::default_location()?;
                tracing::debug!("Persisting session in {}", store.path().display());
                Ok(Self::File(store))
            }
        }
    }
}

impl SessionPersistence for SessionStorage {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match self {
            Self::Keyring(store) => store.load_session(),
            Self::File(store) => store.load_session(),
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        match self {
            Self::Keyring(store) => store.save_session(session),
            Self::File(store) => store.save_session(session),
        }
    }

    fn clear_session(&self) -> AuthResult<()> {
        match self {
            Self::Keyring(store) => store.clear_session(),
            Self::File(store) => store.clear_session(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct KeyringSessionStore;

impl KeyringSessionStore {
    fn entry() -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, KEYRING_USERNAME)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringSessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match Self::entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        Self::entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    fn clear_session(&self) -> AuthResult<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }
}

/// Session kept as JSON in the user's data directory, readable only by the
/// owner on Unix.
#[derive(Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> AuthResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| AuthError::SecureStorage("no data directory available".to_string()))?;
        Ok(Self::new(base.join("jotter").join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionPersistence for FileSessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(storage_error(&self.path, &error)),
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| storage_error(parent, &error))?;
        }

        let raw = serde_json::to_string(session)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, raw).map_err(|error| storage_error(&staging, &error))?;
        restrict_permissions(&staging)?;
        std::fs::rename(&staging, &self.path).map_err(|error| storage_error(&self.path, &error))
    }

    fn clear_session(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error(&self.path, &error)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AuthResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|error| storage_error(path, &error))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AuthResult<()> {
    Ok(())
}

fn storage_error(path: &Path, error: &std::io::Error) -> AuthError {
    AuthError::SecureStorage(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use jotter_core::auth::InMemoryAuthProvider;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join(SESSION_FILE));
        let session = InMemoryAuthProvider::default().issue_session("a@example.com", 1_900_000_000);

        assert_eq!(store.load_session().unwrap(), None);
        store.save_session(&session).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session));

        store.clear_session().unwrap();
        assert_eq!(store.load_session().unwrap(), None);
        store.clear_session().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join(SESSION_FILE));
        let session = InMemoryAuthProvider::default().issue_session("a@example.com", 1_900_000_000);
        store.save_session(&session).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn session_survives_reopening_the_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        let session = InMemoryAuthProvider::default().issue_session("a@example.com", 1_900_000_000);

        SessionStorage::File(FileSessionStore::new(&path))
            .save_session(&session)
            .unwrap();

        let reopened = SessionStorage::File(FileSessionStore::new(&path));
        assert_eq!(reopened.load_session().unwrap(), Some(session));
    }

    #[test]
    fn default_store_kind_is_durable() {
        assert_eq!(SessionStorageKind::default(), SessionStorageKind::File);
    }

    #[test]
    fn corrupt_file_is_reported_not_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "not json").unwrap();

        let storage = SessionStorage::File(FileSessionStore::new(path));
        assert!(matches!(storage.load_session(), Err(AuthError::Json(_))));
    }
}
