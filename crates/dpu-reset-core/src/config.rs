use crate::{
    characteristics::{DPU_NR_ATOMIC_BITS, DPU_NR_THREADS, NR_THREADS_TO_RESET_ATOMIC_BITS},
    chip::ChipRevision,
    error::ConfigError,
};

/// Geometry and atomic reset ceiling used by one boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResetConfig {
    /// Size of the shared atomic bank.
    pub nr_atomic_bits: u16,
    /// Number of hardware threads running the reset.
    pub nr_threads: u8,
    /// Threads with an id at or above this value skip the atomic phase.
    pub ceiling: u8,
}

impl ResetConfig {
    /// Builds a configuration with the legacy 16-thread ceiling.
    pub const fn new(nr_atomic_bits: u16, nr_threads: u8) -> Self {
        Self {
            nr_atomic_bits,
            nr_threads,
            ceiling: NR_THREADS_TO_RESET_ATOMIC_BITS,
        }
    }

    /// Configuration matching a chip revision.
    ///
    /// The ceiling stays at the legacy value for every revision; callers that
    /// know their part is free of the erratum relax it with
    /// [`with_ceiling`](Self::with_ceiling).
    pub fn for_revision(revision: ChipRevision) -> Self {
        let chars = revision.characteristics();
        Self::new(chars.nr_atomic_bits, chars.nr_threads)
    }

    pub const fn with_ceiling(mut self, ceiling: u8) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Number of threads clearing atomic bits, which is also the stride
    /// between the indices a single thread visits.
    ///
    /// With fewer threads than the ceiling the stride shrinks to the thread
    /// count so that the bank is still fully covered.
    pub fn participants(&self) -> u8 {
        self.ceiling.min(self.nr_threads)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nr_atomic_bits == 0 {
            return Err(ConfigError::NoAtomicBits);
        }
        if self.nr_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.ceiling == 0 {
            return Err(ConfigError::ZeroCeiling);
        }
        Ok(())
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self::new(DPU_NR_ATOMIC_BITS, DPU_NR_THREADS)
    }
}
