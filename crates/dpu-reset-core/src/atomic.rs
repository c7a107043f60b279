//! Shared bank of atomic bits.
//!
//! Every hardware thread sees the same bank. Cells are lock-free so the
//! simulator can run threads truly in parallel; the reset relies on the
//! partition being disjoint, not on any lock.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct AtomicBitBank {
    bits: Box<[AtomicBool]>,
}

impl AtomicBitBank {
    /// Creates a bank of `len` cleared bits.
    pub fn new(len: u16) -> Self {
        let bits = (0..len).map(|_| AtomicBool::new(false)).collect();
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Sets bit `index`, returning its previous value.
    ///
    /// # Panics
    /// Panics if `index` is outside the bank.
    pub fn acquire(&self, index: u16) -> bool {
        self.bits[index as usize].swap(true, Ordering::AcqRel)
    }

    /// Clears bit `index`, returning whether it was set.
    ///
    /// # Panics
    /// Panics if `index` is outside the bank.
    pub fn release(&self, index: u16) -> bool {
        self.bits[index as usize].swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self, index: u16) -> bool {
        self.bits[index as usize].load(Ordering::Acquire)
    }

    pub fn set_count(&self) -> usize {
        self.bits
            .iter()
            .filter(|bit| bit.load(Ordering::Acquire))
            .count()
    }

    pub fn all_clear(&self) -> bool {
        self.set_count() == 0
    }

    /// Forces every bit to `value` (power-on contents are undefined).
    pub fn fill(&self, value: bool) {
        for bit in self.bits.iter() {
            bit.store(value, Ordering::Release);
        }
    }

    pub fn bits(&self) -> Vec<bool> {
        self.bits
            .iter()
            .map(|bit| bit.load(Ordering::Acquire))
            .collect()
    }
}
