//! Memory that survives a power-rail reset but not a full wipe (RTC slow memory on ESP32).

use thiserror_no_std::Error;

/// Bytes the hardware guarantees to preserve across a reset.
pub const RETAINED_CAPACITY: usize = 2048;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainedMemoryError {
    #[error("Image of {len} bytes exceeds retained capacity ({max})")]
    TooLarge { len: usize, max: usize },
    #[error("Retained memory write failed")]
    WriteFailed,
}

/// Whole-region access to retained memory.
///
/// The region is always replaced in a single `write`, so a reader never sees a
/// half-written header and slot table.
pub trait RetainedMemory {
    /// Current image. Empty before the first write after a full wipe.
    fn read(&self) -> &[u8];

    fn write(&mut self, image: &[u8]) -> Result<(), RetainedMemoryError>;
}

/// Retained memory held in RAM, for hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct RamRetainedMemory {
    image: heapless::Vec<u8, RETAINED_CAPACITY>,
}

impl RamRetainedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a full memory wipe (battery removed).
    pub fn wipe(&mut self) {
        self.image.clear();
    }
}

impl RetainedMemory for RamRetainedMemory {
    fn read(&self) -> &[u8] {
        &self.image
    }

    fn write(&mut self, image: &[u8]) -> Result<(), RetainedMemoryError> {
        if image.len() > RETAINED_CAPACITY {
            return Err(RetainedMemoryError::TooLarge {
                len: image.len(),
                max: RETAINED_CAPACITY,
            });
        }
        self.image.clear();
        self.image
            .extend_from_slice(image)
            .map_err(|_| RetainedMemoryError::WriteFailed)
    }
}

impl<M: RetainedMemory + ?Sized> RetainedMemory for &mut M {
    fn read(&self) -> &[u8] {
        (**self).read()
    }

    fn write(&mut self, image: &[u8]) -> Result<(), RetainedMemoryError> {
        (**self).write(image)
    }
}
