use crate::thread::ThreadId;

/// Register operations the reset routine performs on its own thread.
///
/// Implementations back these with real hardware or with the simulator in
/// [`crate::thread::ThreadContext`].
pub trait ThreadHal {
    /// Read-only id register, fixed at thread start.
    fn read_thread_id(&self) -> ThreadId;

    /// Clears atomic bit `index` when it is set.
    ///
    /// Returns `true` when the bit was set, which is the condition under
    /// which the hardware takes the `nz` branch. A clear bit stays clear.
    fn release_atomic_bit(&mut self, index: u16) -> bool;

    /// Loads `value` into the work register through an `add`, clearing the
    /// zero and carry flags, then writes it into the performance-counter
    /// configuration register.
    fn set_flags_and_perf_config(&mut self, value: u32);

    /// Stops the thread and records `address` as the program counter for the
    /// next dispatch.
    fn halt_to(&mut self, address: u32);
}

// Allow mutable references to HAL implementors to be used wherever a HAL is
// expected, so callers can keep ownership of their context.
impl<T: ThreadHal + ?Sized> ThreadHal for &mut T {
    fn read_thread_id(&self) -> ThreadId {
        (**self).read_thread_id()
    }

    fn release_atomic_bit(&mut self, index: u16) -> bool {
        (**self).release_atomic_bit(index)
    }

    fn set_flags_and_perf_config(&mut self, value: u32) {
        (**self).set_flags_and_perf_config(value)
    }

    fn halt_to(&mut self, address: u32) {
        (**self).halt_to(address)
    }
}
