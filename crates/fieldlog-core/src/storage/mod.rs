//! Reset-surviving storage: the retained memory seam and the cycle accumulator on top of it.

pub mod accumulator;
pub mod retained;

pub use accumulator::{
    AccumulatorError, AccumulatorHeader, CycleAccumulator, DEFAULT_SLOT_SIZE, HEADER_SIZE,
    SlotLayout,
};
pub use retained::{RETAINED_CAPACITY, RamRetainedMemory, RetainedMemory, RetainedMemoryError};
