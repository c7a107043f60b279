//! Thread reset sequence.
//!
//! Every hardware thread runs [`ResetSequencer::run`] once at boot:
//!
//! 1. threads whose id is at or above the ceiling skip to step 4;
//! 2. the others start at bit `(N - 1) - id`;
//! 3. each releases its current bit and steps down by the number of
//!    participating threads while the index stays non-negative;
//! 4. the work register is loaded with 7 through an `add`, clearing Z and C,
//!    and written into the performance-counter configuration register;
//! 5. the thread stops with a program counter of 0.
//!
//! Two participating threads never target the same bit because their start
//! indices differ by less than the stride, so the shared bank is cleared
//! without any lock.
//!
//! Precondition: on chips with the atomic reset erratum, at most
//! [`NR_THREADS_TO_RESET_ATOMIC_BITS`](crate::characteristics::NR_THREADS_TO_RESET_ATOMIC_BITS)
//! threads may release bits. Violating it leaves bits set; nothing at this
//! stage can detect or report that.

use thiserror::Error;

use crate::{
    characteristics::{BOOT_PC, PERF_COUNTER_BASELINE},
    config::ResetConfig,
    hal::ThreadHal,
    thread::ThreadId,
};

/// Summary of one thread's reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetOutcome {
    /// Release operations issued.
    pub attempts: usize,
    /// Releases that found their bit set.
    pub cleared: usize,
}

/// Two threads claimed the same atomic bit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("atomic bit {index} claimed by threads {first} and {second}")]
pub struct PartitionOverlap {
    pub index: u16,
    pub first: ThreadId,
    pub second: ThreadId,
}

#[derive(Debug, Clone, Copy)]
pub struct ResetSequencer {
    config: ResetConfig,
}

impl ResetSequencer {
    pub fn new(config: ResetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResetConfig {
        &self.config
    }

    /// Whether thread `id` takes part in the atomic bit reset.
    pub fn is_eligible(&self, id: ThreadId) -> bool {
        id.0 < self.config.participants()
    }

    /// Indices thread `id` releases, in order.
    pub fn partition(&self, id: ThreadId) -> Partition {
        let next = if self.is_eligible(id) {
            i32::from(self.config.nr_atomic_bits) - 1 - i32::from(id.0)
        } else {
            -1
        };
        Partition {
            next,
            stride: i32::from(self.config.participants()),
        }
    }

    /// Number of release operations thread `id` performs.
    pub fn clear_attempts(&self, id: ThreadId) -> usize {
        let n = usize::from(self.config.nr_atomic_bits);
        let first = usize::from(id.0);
        if !self.is_eligible(id) || first >= n {
            return 0;
        }
        (n - 1 - first) / usize::from(self.config.participants()) + 1
    }

    /// Runs the reset on the thread behind `hal`. Never fails.
    pub fn run<H: ThreadHal>(&self, mut hal: H) -> ResetOutcome {
        let id = hal.read_thread_id();
        let mut outcome = ResetOutcome::default();

        if self.is_eligible(id) {
            tracing::debug!(thread = %id, "clearing atomic bits");
            for index in self.partition(id) {
                outcome.attempts += 1;
                if hal.release_atomic_bit(index) {
                    outcome.cleared += 1;
                }
            }
        } else {
            tracing::debug!(thread = %id, "above atomic reset ceiling, skipping bank");
        }

        hal.set_flags_and_perf_config(PERF_COUNTER_BASELINE);
        hal.halt_to(BOOT_PC);
        outcome
    }

    /// Checks that no two threads claim the same bit.
    ///
    /// Always holds for the stride used here; the check guards configurable
    /// geometries in debug builds.
    pub fn check_partition_disjoint(&self) -> Result<(), PartitionOverlap> {
        let mut owner: Vec<Option<ThreadId>> =
            vec![None; usize::from(self.config.nr_atomic_bits)];
        for id in (0..self.config.nr_threads).map(ThreadId) {
            for index in self.partition(id) {
                let slot = &mut owner[usize::from(index)];
                if let Some(first) = *slot {
                    return Err(PartitionOverlap {
                        index,
                        first,
                        second: id,
                    });
                }
                *slot = Some(id);
            }
        }
        Ok(())
    }
}

/// Descending, strided index sequence of one thread.
#[derive(Debug, Clone)]
pub struct Partition {
    next: i32,
    stride: i32,
}

impl Iterator for Partition {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.next < 0 {
            return None;
        }
        let index = self.next as u16;
        self.next -= self.stride;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = if self.next < 0 {
            0
        } else {
            (self.next / self.stride) as usize + 1
        };
        (len, Some(len))
    }
}

impl ExactSizeIterator for Partition {}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(seq: &ResetSequencer, id: u8) -> Vec<u16> {
        seq.partition(ThreadId(id)).collect()
    }

    #[test]
    fn fewer_threads_than_ceiling_shrink_the_stride() {
        let seq = ResetSequencer::new(ResetConfig::new(24, 4));
        assert_eq!(indices(&seq, 0), vec![23, 19, 15, 11, 7, 3]);
        assert_eq!(indices(&seq, 3), vec![20, 16, 12, 8, 4, 0]);
        assert_eq!(seq.clear_attempts(ThreadId(0)), 6);
        assert_eq!(seq.clear_attempts(ThreadId(3)), 6);
        assert_eq!(seq.check_partition_disjoint(), Ok(()));

        let covered: usize = (0..4).map(|id| seq.clear_attempts(ThreadId(id))).sum();
        assert_eq!(covered, 24);
    }

    #[test]
    fn single_bit_is_cleared_by_thread_zero_only() {
        let seq = ResetSequencer::new(ResetConfig::new(1, 24));
        assert_eq!(indices(&seq, 0), vec![0]);
        for id in 1..24 {
            assert!(indices(&seq, id).is_empty(), "thread {id}");
            assert_eq!(seq.clear_attempts(ThreadId(id)), 0);
        }
    }

    #[test]
    fn attempts_match_partition_length() {
        let seq = ResetSequencer::new(ResetConfig::new(24, 24));
        for id in 0..24 {
            let id = ThreadId(id);
            assert_eq!(seq.clear_attempts(id), seq.partition(id).count());
            assert_eq!(seq.partition(id).len(), seq.clear_attempts(id));
        }
    }

    #[test]
    fn threads_beyond_bank_size_do_nothing() {
        let seq = ResetSequencer::new(ResetConfig::new(5, 24));
        assert_eq!(seq.clear_attempts(ThreadId(4)), 1);
        assert_eq!(seq.clear_attempts(ThreadId(5)), 0);
        assert_eq!(indices(&seq, 9), Vec::<u16>::new());
    }

    #[test]
    fn default_geometry_is_disjoint() {
        let seq = ResetSequencer::new(ResetConfig::default());
        assert_eq!(seq.check_partition_disjoint(), Ok(()));
        assert_eq!(seq.clear_attempts(ThreadId(0)), 16);
        assert_eq!(seq.clear_attempts(ThreadId(15)), 16);
    }
}
