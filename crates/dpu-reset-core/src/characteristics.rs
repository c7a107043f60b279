//! Shared definitions for the DPU thread reset.
//!
//! Centralizing the hardware characteristics keeps the register baseline and
//! the bank geometry in one location, so no magic numbers sneak into the
//! sequencer, the instruction listing or the simulator.

/// Number of atomic bits in the shared bank of the default hardware.
pub const DPU_NR_ATOMIC_BITS: u16 = 256;

/// Number of hardware threads (tasklets) of the default hardware.
pub const DPU_NR_THREADS: u8 = 24;

/// Maximum number of threads taking part in the atomic bit reset.
///
/// v1.4 chips only clear the atomic bank correctly when no more than 16
/// threads release bits during the reset. Threads whose id is at or above
/// this ceiling skip the atomic phase entirely, and the participating threads
/// stride through the bank by this amount.
pub const NR_THREADS_TO_RESET_ATOMIC_BITS: u8 = 16;

/// Value written to the performance-counter configuration register.
pub const PERF_COUNTER_BASELINE: u32 = 7;

/// Program counter recorded by the final stop.
pub const BOOT_PC: u32 = 0;

/// Linker section the bootstrap routine is placed in.
pub const BOOTSTRAP_SECTION: &str = ".text.__bootstrap";

/// Entry symbol of the bootstrap routine.
pub const BOOTSTRAP_SYMBOL: &str = "__bootstrap";
