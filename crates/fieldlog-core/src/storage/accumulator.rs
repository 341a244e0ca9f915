//! Multi-cycle payload accumulator in retained memory.
//!
//! Binary layout of the retained region (little-endian):
//!
//! ```text
//! offset 0   slot_count  u32
//! offset 4   alarm_flag  u8 (0/1)
//! offset 5   reserved    3 bytes
//! offset 8   slot 0      slot_size bytes: hex ASCII, NUL, zero padding
//! ...        slot i      at 8 + i * slot_size
//! ```
//!
//! The region is `8 + max_slots * slot_size` bytes. Any other size (first boot, or a
//! slot size change) is treated as unformatted: reads see an empty accumulator with the
//! alarm clear, and the next write reformats the whole region to zero, losing whatever
//! it held.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, info, warn};
use thiserror_no_std::Error;

use super::retained::{RETAINED_CAPACITY, RetainedMemory, RetainedMemoryError};

/// Size of the accumulator header.
pub const HEADER_SIZE: usize = 8;

/// Slot size used when the configuration does not say otherwise.
pub const DEFAULT_SLOT_SIZE: usize = 256;

const _: () = assert!(
    HEADER_SIZE + ((RETAINED_CAPACITY - HEADER_SIZE) / DEFAULT_SLOT_SIZE) * DEFAULT_SLOT_SIZE
        <= RETAINED_CAPACITY
);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("Slot size {slot_size} leaves no room for a slot")]
    InvalidSlotSize { slot_size: usize },
    #[error("Accumulator full ({max_slots} slots)")]
    Full { max_slots: usize },
    #[error("Payload of {len} bytes does not fit a {slot_size} byte slot")]
    PayloadTooLarge { len: usize, slot_size: usize },
    #[error("Retained memory error: {0}")]
    Memory(RetainedMemoryError),
}

/// Slot geometry derived from the slot size and the retained-memory ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    slot_size: usize,
    max_slots: usize,
}

impl SlotLayout {
    pub fn new(slot_size: usize) -> Result<Self, AccumulatorError> {
        if slot_size < 2 {
            return Err(AccumulatorError::InvalidSlotSize { slot_size });
        }

        let max_slots = (RETAINED_CAPACITY - HEADER_SIZE) / slot_size;
        if max_slots == 0 {
            return Err(AccumulatorError::InvalidSlotSize { slot_size });
        }

        Ok(Self {
            slot_size,
            max_slots,
        })
    }

    pub const fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub const fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Size of a formatted region.
    pub const fn total_size(&self) -> usize {
        HEADER_SIZE + self.max_slots * self.slot_size
    }

    const fn slot_range(&self, index: usize) -> core::ops::Range<usize> {
        let start = HEADER_SIZE + index * self.slot_size;
        start..start + self.slot_size
    }
}

/// First 8 bytes of the retained region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorHeader {
    pub slot_count: u32,
    pub alarm_flag: bool,
}

impl AccumulatorHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.slot_count.to_le_bytes());
        bytes[4] = self.alarm_flag as u8;
        // 5..8 reserved, zero
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut count_bytes = [0u8; 4];
        count_bytes.copy_from_slice(&bytes[0..4]);

        Self {
            slot_count: u32::from_le_bytes(count_bytes),
            alarm_flag: bytes[4] == 1,
        }
    }
}

/// Batches encoded payloads across wake cycles until it is time to transmit.
pub struct CycleAccumulator<M: RetainedMemory> {
    memory: M,
    layout: SlotLayout,
    target: usize,
}

impl<M: RetainedMemory> CycleAccumulator<M> {
    /// Attach to retained memory.
    ///
    /// `target` is the number of cycles to batch before a transmit. It is clamped to
    /// `1..=max_slots`.
    pub fn new(memory: M, slot_size: usize, target: usize) -> Result<Self, AccumulatorError> {
        let layout = SlotLayout::new(slot_size)?;

        let clamped = target.clamp(1, layout.max_slots());
        if clamped != target {
            warn!(
                "Accumulation target {} clamped to {} ({} byte slots)",
                target, clamped, slot_size
            );
        }

        Ok(Self {
            memory,
            layout,
            target: clamped,
        })
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Clamped accumulation target.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn into_memory(self) -> M {
        self.memory
    }

    fn formatted(&self) -> Option<&[u8]> {
        let image = self.memory.read();
        (image.len() == self.layout.total_size()).then_some(image)
    }

    /// Header as stored, or an empty header if the region is unformatted.
    pub fn header(&self) -> AccumulatorHeader {
        let Some(image) = self.formatted() else {
            return AccumulatorHeader::default();
        };

        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(&image[..HEADER_SIZE]);
        AccumulatorHeader::from_bytes(&bytes)
    }

    /// Live payload count, never above `max_slots`.
    pub fn slot_count(&self) -> usize {
        (self.header().slot_count as usize).min(self.layout.max_slots())
    }

    /// Mutable copy of the region, zeroed if it is not formatted for this layout.
    fn working_image(&self) -> Vec<u8> {
        match self.formatted() {
            Some(image) => image.to_vec(),
            None => {
                let found = self.memory.read().len();
                if found != 0 {
                    warn!(
                        "Retained region is {} bytes, expected {}: reformatting",
                        found,
                        self.layout.total_size()
                    );
                } else {
                    debug!("Formatting retained region");
                }
                vec![0u8; self.layout.total_size()]
            }
        }
    }

    fn commit(&mut self, image: &[u8]) -> Result<(), AccumulatorError> {
        self.memory.write(image).map_err(AccumulatorError::Memory)
    }

    /// Append one payload.
    ///
    /// Fails without touching memory if the accumulator is full or the payload plus its
    /// terminator does not fit a slot.
    pub fn store(&mut self, payload: &str) -> Result<(), AccumulatorError> {
        let mut header = self.header();
        let count = (header.slot_count as usize).min(self.layout.max_slots());

        if count >= self.layout.max_slots() {
            warn!("Accumulator full, dropping payload");
            return Err(AccumulatorError::Full {
                max_slots: self.layout.max_slots(),
            });
        }

        if payload.len() + 1 > self.layout.slot_size() {
            warn!(
                "Payload of {} bytes exceeds slot size {}",
                payload.len(),
                self.layout.slot_size()
            );
            return Err(AccumulatorError::PayloadTooLarge {
                len: payload.len(),
                slot_size: self.layout.slot_size(),
            });
        }

        let mut image = self.working_image();

        let slot = &mut image[self.layout.slot_range(count)];
        slot.fill(0);
        slot[..payload.len()].copy_from_slice(payload.as_bytes());

        header.slot_count = count as u32 + 1;
        image[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        self.commit(&image)?;
        info!(
            "Stored payload ({} bytes), cycle {} of {}",
            payload.len(),
            header.slot_count,
            self.target
        );
        Ok(())
    }

    /// Stored payloads, oldest first. Does not clear them.
    pub fn drain(&self) -> Vec<String> {
        let Some(image) = self.formatted() else {
            return Vec::new();
        };

        (0..self.slot_count())
            .map(|index| {
                let slot = &image[self.layout.slot_range(index)];
                let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
                String::from_utf8_lossy(&slot[..end]).into_owned()
            })
            .collect()
    }

    /// Drop every stored payload. The alarm flag is kept.
    pub fn clear(&mut self) -> Result<(), AccumulatorError> {
        let mut header = self.header();
        header.slot_count = 0;

        let mut image = self.working_image();
        image.fill(0);
        image[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        self.commit(&image)?;
        debug!("Accumulator cleared");
        Ok(())
    }

    pub fn get_alarm_flag(&self) -> bool {
        self.header().alarm_flag
    }

    pub fn set_alarm_flag(&mut self, alarm: bool) -> Result<(), AccumulatorError> {
        let mut header = self.header();
        header.alarm_flag = alarm;

        let mut image = self.working_image();
        image[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
        self.commit(&image)
    }

    /// Whether enough cycles are stored to warrant a transmit.
    pub fn should_transmit(&self) -> bool {
        self.slot_count() >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RamRetainedMemory;
    use alloc::format;

    #[test]
    fn test_header_layout() {
        let header = AccumulatorHeader {
            slot_count: 0x0102_0304,
            alarm_flag: true,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01, 1, 0, 0, 0]);
        assert_eq!(AccumulatorHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn test_layout_fits_ceiling() {
        let layout = SlotLayout::new(DEFAULT_SLOT_SIZE).unwrap();
        assert_eq!(layout.max_slots(), 7);
        assert_eq!(layout.total_size(), 8 + 7 * 256);

        assert_eq!(SlotLayout::new(16).unwrap().max_slots(), 127);
        assert!(SlotLayout::new(0).is_err());
        assert!(SlotLayout::new(RETAINED_CAPACITY).is_err());
    }

    #[test]
    fn test_capacity_with_small_slots() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 16, 200).unwrap();
        let max_slots = accumulator.layout().max_slots();
        assert_eq!(max_slots, 127);
        assert_eq!(accumulator.target(), 127);

        for index in 0..max_slots {
            accumulator.store(&format!("{:04x}", index)).unwrap();
        }
        assert_eq!(accumulator.slot_count(), max_slots);

        let before = accumulator.memory().read().to_vec();
        assert_eq!(
            accumulator.store("ffff"),
            Err(AccumulatorError::Full { max_slots: 127 })
        );
        assert_eq!(accumulator.slot_count(), max_slots);
        assert_eq!(accumulator.memory().read(), &before[..]);
    }

    #[test]
    fn test_payload_must_leave_room_for_terminator() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 16, 5).unwrap();

        assert!(accumulator.store("0123456789abcde").is_ok());
        assert_eq!(
            accumulator.store("0123456789abcdef"),
            Err(AccumulatorError::PayloadTooLarge {
                len: 16,
                slot_size: 16
            })
        );
        assert_eq!(accumulator.slot_count(), 1);
    }

    #[test]
    fn test_drain_returns_oldest_first() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 64, 5).unwrap();
        accumulator.store("0067010a").unwrap();
        accumulator.store("").unwrap();
        accumulator.store("0100ff").unwrap();

        assert_eq!(accumulator.drain(), ["0067010a", "", "0100ff"]);
        // Drain does not clear.
        assert_eq!(accumulator.slot_count(), 3);
    }

    #[test]
    fn test_clear_preserves_alarm() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 256, 5).unwrap();
        accumulator.set_alarm_flag(true).unwrap();
        accumulator.store("000001").unwrap();

        accumulator.clear().unwrap();

        assert!(accumulator.get_alarm_flag());
        assert_eq!(accumulator.slot_count(), 0);
        assert!(accumulator.drain().is_empty());
        assert!(accumulator.memory().read()[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_should_transmit_uses_target() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 256, 2).unwrap();
        accumulator.store("00").unwrap();
        assert!(!accumulator.should_transmit());
        accumulator.store("01").unwrap();
        assert!(accumulator.should_transmit());
    }

    #[test]
    fn test_state_survives_reattach() {
        let mut memory = RamRetainedMemory::new();
        {
            let mut accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
            accumulator.store("0100ff").unwrap();
            accumulator.set_alarm_flag(true).unwrap();
        }

        let accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
        assert_eq!(accumulator.slot_count(), 1);
        assert!(accumulator.get_alarm_flag());
        assert_eq!(accumulator.drain(), ["0100ff"]);
    }

    #[test]
    fn test_slot_size_change_reformats() {
        let mut memory = RamRetainedMemory::new();
        {
            let mut accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
            accumulator.store("0100ff").unwrap();
            accumulator.set_alarm_flag(true).unwrap();
        }

        let mut accumulator = CycleAccumulator::new(&mut memory, 128, 5).unwrap();
        assert_eq!(accumulator.slot_count(), 0);
        assert!(!accumulator.get_alarm_flag());

        accumulator.store("0200aa").unwrap();
        assert_eq!(accumulator.memory().read().len(), 8 + 15 * 128);
        assert_eq!(accumulator.drain(), ["0200aa"]);
    }

    #[test]
    fn test_wiped_memory_reads_empty() {
        let mut memory = RamRetainedMemory::new();
        {
            let mut accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
            accumulator.store("00").unwrap();
        }
        memory.wipe();

        let accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
        assert_eq!(accumulator.slot_count(), 0);
        assert!(!accumulator.get_alarm_flag());
    }

    #[test]
    fn test_corrupt_count_is_clamped() {
        let mut memory = RamRetainedMemory::new();
        let layout = SlotLayout::new(256).unwrap();
        let mut image = vec![0u8; layout.total_size()];
        image[..HEADER_SIZE].copy_from_slice(
            &AccumulatorHeader {
                slot_count: 1000,
                alarm_flag: false,
            }
            .to_bytes(),
        );
        memory.write(&image).unwrap();

        let mut accumulator = CycleAccumulator::new(&mut memory, 256, 5).unwrap();
        assert_eq!(accumulator.slot_count(), 7);
        assert!(matches!(accumulator.store("00"), Err(AccumulatorError::Full { .. })));
    }
}
