//! Non-volatile backing for the dynamic configuration tree.

use alloc::vec::Vec;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage read failed: {0}")]
    Read(&'static str),
    #[error("Storage write failed: {0}")]
    Write(&'static str),
}

/// Whole-document persistence: the tree is always read and rewritten in one piece.
pub trait ConfigStorage {
    /// Stored bytes, or `None` if nothing has been saved yet.
    fn load(&mut self) -> Result<Option<Vec<u8>>, StorageError>;

    fn save(&mut self, bytes: &[u8]) -> Result<(), StorageError>;
}

/// In-memory storage for hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct RamConfigStorage {
    bytes: Option<Vec<u8>>,
    saves: usize,
    fail_writes: bool,
}

impl RamConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated storage, as if a previous boot had saved `bytes`.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

impl ConfigStorage for RamConfigStorage {
    fn load(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.bytes.clone())
    }

    fn save(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write("simulated failure"));
        }
        self.bytes = Some(bytes.to_vec());
        self.saves += 1;
        Ok(())
    }
}
