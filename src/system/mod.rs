pub mod cpu;
pub mod memory;

pub use cpu::{UtilizationSample, UtilizationTracker};
pub use memory::{MemoryCounters, MemorySample};
