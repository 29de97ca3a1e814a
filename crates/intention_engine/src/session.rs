use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use intention_core::{SessionSnapshot, SessionStore, StoreError};
use intention_logging::{intention_debug, intention_info};

use crate::persist::AtomicFileWriter;

pub const SESSION_FILENAME: &str = "session.ron";

/// Session persisted as a single RON file inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    writer: AtomicFileWriter,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn path(&self) -> PathBuf {
        self.dir().join(SESSION_FILENAME)
    }
}

impl SessionStore for FileSessionStore {
    fn read_all(&self) -> Result<SessionSnapshot, StoreError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                intention_debug!("No session at {:?}; starting empty", path);
                return Ok(SessionSnapshot::default());
            }
            Err(err) => return Err(StoreError::Unavailable(err.to_string())),
        };
        let snapshot: SessionSnapshot =
            ron::from_str(&content).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        intention_debug!(
            "Loaded session from {:?} ({} features)",
            path,
            snapshot.tests.len()
        );
        Ok(snapshot)
    }

    fn write_all(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(snapshot, pretty)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.writer
            .write(SESSION_FILENAME, &content)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.path()) {
            Ok(()) => {
                intention_info!("Cleared session in {:?}", self.dir());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Unavailable(err.to_string())),
        }
    }
}
