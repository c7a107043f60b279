use std::fmt;

use crate::{atomic::AtomicBitBank, hal::ThreadHal, status::Flags};

/// Hardware thread (tasklet) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "snapshot-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadId(pub u8);

impl ThreadId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Per-thread architectural state touched by the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadState {
    pub id: ThreadId,
    /// Work register `r0`.
    pub r0: i32,
    pub flags: Flags,
    /// Performance-counter configuration register.
    pub perf_config: u32,
    pub pc: u32,
    pub halted: bool,
}

impl ThreadState {
    /// State of a thread right after power-on, before the reset ran.
    ///
    /// The values are arbitrary but deliberately away from the baseline so
    /// that a missing reset step shows up.
    pub fn power_on(id: ThreadId) -> Self {
        Self {
            id,
            r0: -1,
            flags: Flags::ZERO | Flags::CARRY,
            perf_config: 0xFFFF_FFFF,
            pc: 0xDEAD,
            halted: false,
        }
    }

    /// Makes a halted thread runnable again at `pc`.
    pub fn redispatch(&mut self, pc: u32) {
        self.pc = pc;
        self.halted = false;
    }

    /// Whether flags, perf config and program counter hold the baseline.
    pub fn is_baseline(&self) -> bool {
        use crate::characteristics::{BOOT_PC, PERF_COUNTER_BASELINE};
        self.flags.is_empty()
            && self.perf_config == PERF_COUNTER_BASELINE
            && self.pc == BOOT_PC
            && self.halted
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[id:{:2},r0:{},z:{},c:{},perf:0x{:x},pc:0x{:04x},{}]",
            self.id,
            self.r0,
            self.flags.contains(Flags::ZERO) as u8,
            self.flags.contains(Flags::CARRY) as u8,
            self.perf_config,
            self.pc,
            if self.halted { "halted" } else { "running" }
        )
    }
}

/// [`ThreadHal`] over one simulated thread and the shared bank.
#[derive(Debug)]
pub struct ThreadContext<'a> {
    state: &'a mut ThreadState,
    bank: &'a AtomicBitBank,
    releases: usize,
}

impl<'a> ThreadContext<'a> {
    pub fn new(state: &'a mut ThreadState, bank: &'a AtomicBitBank) -> Self {
        Self {
            state,
            bank,
            releases: 0,
        }
    }

    pub fn state(&self) -> &ThreadState {
        &*self.state
    }

    /// Number of release operations issued through this context.
    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl ThreadHal for ThreadContext<'_> {
    fn read_thread_id(&self) -> ThreadId {
        self.state.id
    }

    fn release_atomic_bit(&mut self, index: u16) -> bool {
        self.releases += 1;
        let was_set = self.bank.release(index);
        tracing::trace!(thread = %self.state.id, index, was_set, "release");
        was_set
    }

    fn set_flags_and_perf_config(&mut self, value: u32) {
        // `add r0, zero, value`
        self.state.r0 = value as i32;
        self.state.flags = Flags::from_add(0, value);
        // `time_cfg zero, r0`
        self.state.perf_config = value;
    }

    fn halt_to(&mut self, address: u32) {
        self.state.pc = address;
        self.state.halted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_is_not_baseline() {
        assert!(!ThreadState::power_on(ThreadId(3)).is_baseline());
    }

    #[test]
    fn context_applies_register_writes() {
        let bank = AtomicBitBank::new(8);
        bank.acquire(5);
        let mut state = ThreadState::power_on(ThreadId(2));
        let mut ctx = ThreadContext::new(&mut state, &bank);

        assert_eq!(ctx.read_thread_id(), ThreadId(2));
        assert!(ctx.release_atomic_bit(5));
        assert!(!ctx.release_atomic_bit(5));
        ctx.set_flags_and_perf_config(7);
        ctx.halt_to(0);
        assert_eq!(ctx.releases(), 2);

        assert!(state.is_baseline());
        assert_eq!(state.r0, 7);
        assert!(bank.all_clear());
    }

    #[test]
    fn redispatch_makes_thread_runnable() {
        let mut state = ThreadState::power_on(ThreadId(0));
        state.halted = true;
        state.redispatch(0x40);
        assert!(!state.halted);
        assert_eq!(state.pc, 0x40);
    }
}
