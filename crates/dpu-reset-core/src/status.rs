use bitflags::bitflags;

bitflags! {
    /// Condition flags of a DPU thread.
    ///
    /// Only the two flags the reset routine touches are modelled. Both are
    /// rewritten by every `add`/`sub`, which is how the routine clears them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "snapshot-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Flags: u8 {
        /// Zero flag (Z)
        /// Set when the result of an operation is zero.
        const ZERO  = 0b0000_0001;

        /// Carry flag (C)
        /// Set on a carry out of an addition or a borrow in a subtraction.
        const CARRY = 0b0000_0010;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

impl Flags {
    /// Set or clear the Zero flag based on a result.
    pub fn update_zero(&mut self, value: i32) {
        self.set(Flags::ZERO, value == 0);
    }

    pub fn set_carry(&mut self, carry: bool) {
        self.set(Flags::CARRY, carry);
    }

    /// Flags produced by a 32-bit addition.
    pub fn from_add(lhs: u32, rhs: u32) -> Self {
        let (result, carry) = lhs.overflowing_add(rhs);
        let mut flags = Flags::empty();
        flags.update_zero(result as i32);
        flags.set_carry(carry);
        flags
    }

    /// Flags produced by a 32-bit subtraction (carry holds the borrow).
    pub fn from_sub(lhs: u32, rhs: u32) -> Self {
        let (result, borrow) = lhs.overflowing_sub(rhs);
        let mut flags = Flags::empty();
        flags.update_zero(result as i32);
        flags.set_carry(borrow);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_of_small_immediate_clears_both_flags() {
        assert_eq!(Flags::from_add(0, 7), Flags::empty());
    }

    #[test]
    fn add_sets_carry_and_zero_on_wrap() {
        assert_eq!(Flags::from_add(u32::MAX, 1), Flags::ZERO | Flags::CARRY);
    }

    #[test]
    fn sub_borrow_sets_carry() {
        let flags = Flags::from_sub(3, 16);
        assert!(flags.contains(Flags::CARRY));
        assert!(!flags.contains(Flags::ZERO));
        assert_eq!(Flags::from_sub(16, 16), Flags::ZERO);
    }
}
