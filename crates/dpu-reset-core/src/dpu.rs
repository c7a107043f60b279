//! Behavioral model of a DPU booting its threads.
//!
//! Each hardware thread runs the reset on its own host thread, concurrently
//! with the others and without any lock on the shared bank.

use std::thread;

use crate::{
    atomic::AtomicBitBank,
    config::ResetConfig,
    error::Error,
    program::{Interpreter, Program, bootstrap_program},
    sequencer::ResetSequencer,
    thread::{ThreadContext, ThreadId, ThreadState},
};

/// How each thread executes the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BootMode {
    /// Structured [`ResetSequencer`].
    #[default]
    Sequencer,
    /// Instruction-level [`Program`] through the [`Interpreter`].
    Program,
}

/// Per-thread result of a boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadReport {
    pub id: ThreadId,
    /// Release operations issued.
    pub attempts: usize,
    /// Releases that found their bit set.
    pub cleared: usize,
}

#[derive(Debug)]
pub struct Dpu {
    config: ResetConfig,
    sequencer: ResetSequencer,
    program: Program,
    bank: AtomicBitBank,
    threads: Vec<ThreadState>,
}

/// Captured DPU state, comparable across boots.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DpuSnapshot {
    pub bits: Vec<bool>,
    pub threads: Vec<ThreadState>,
}

impl Dpu {
    /// Constructs a DPU with a cleared bank and threads in power-on state.
    pub fn new(config: ResetConfig) -> Result<Self, Error> {
        let program = bootstrap_program(&config)?;
        let threads = (0..config.nr_threads)
            .map(|id| ThreadState::power_on(ThreadId(id)))
            .collect();
        Ok(Self {
            config,
            sequencer: ResetSequencer::new(config),
            program,
            bank: AtomicBitBank::new(config.nr_atomic_bits),
            threads,
        })
    }

    /// Like [`Dpu::new`] but with every atomic bit set, as left over by a
    /// previous program.
    pub fn power_on(config: ResetConfig) -> Result<Self, Error> {
        let dpu = Self::new(config)?;
        dpu.bank.fill(true);
        Ok(dpu)
    }

    pub fn config(&self) -> &ResetConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &ResetSequencer {
        &self.sequencer
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn bank(&self) -> &AtomicBitBank {
        &self.bank
    }

    pub fn threads(&self) -> &[ThreadState] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Result<&ThreadState, Error> {
        self.threads.get(id.index()).ok_or(Error::ThreadOutOfRange {
            id,
            nr_threads: self.config.nr_threads,
        })
    }

    /// Makes halted thread `id` runnable again at `pc`.
    pub fn redispatch(&mut self, id: ThreadId, pc: u32) -> Result<(), Error> {
        let nr_threads = self.config.nr_threads;
        let state = self
            .threads
            .get_mut(id.index())
            .ok_or(Error::ThreadOutOfRange { id, nr_threads })?;
        if !state.halted {
            return Err(Error::NotHalted { id });
        }
        state.redispatch(pc);
        Ok(())
    }

    /// Boots every thread concurrently, one host thread per hardware thread.
    ///
    /// Fails without running anything if a thread is halted; halted threads
    /// only run again after [`Dpu::redispatch`].
    pub fn boot(&mut self, mode: BootMode) -> Result<Vec<ThreadReport>, Error> {
        self.ensure_runnable()?;
        debug_assert_eq!(
            self.sequencer.check_partition_disjoint(),
            Ok(()),
            "lock-free reset requires a disjoint partition"
        );
        tracing::debug!(?mode, threads = self.threads.len(), "booting DPU");

        let sequencer = &self.sequencer;
        let program = &self.program;
        let bank = &self.bank;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .threads
                .iter_mut()
                .map(|state| {
                    let id = state.id;
                    let handle = scope.spawn(move || {
                        let ctx = ThreadContext::new(state, bank);
                        run_thread(mode, sequencer, program, ctx)
                    });
                    (id, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, handle)| {
                    handle
                        .join()
                        .map_err(|_| Error::ThreadPanicked { id })
                        .and_then(|report| report)
                })
                .collect()
        })
    }

    /// Boots the threads one after another in id order.
    pub fn boot_sequential(&mut self, mode: BootMode) -> Result<Vec<ThreadReport>, Error> {
        self.ensure_runnable()?;
        tracing::debug!(?mode, threads = self.threads.len(), "booting DPU sequentially");
        let bank = &self.bank;
        self.threads
            .iter_mut()
            .map(|state| {
                let ctx = ThreadContext::new(state, bank);
                run_thread(mode, &self.sequencer, &self.program, ctx)
            })
            .collect()
    }

    fn ensure_runnable(&self) -> Result<(), Error> {
        match self.threads.iter().find(|state| state.halted) {
            Some(state) => Err(Error::ThreadHalted { id: state.id }),
            None => Ok(()),
        }
    }

    pub fn snapshot(&self) -> DpuSnapshot {
        DpuSnapshot {
            bits: self.bank.bits(),
            threads: self.threads.clone(),
        }
    }
}

fn run_thread(
    mode: BootMode,
    sequencer: &ResetSequencer,
    program: &Program,
    mut ctx: ThreadContext<'_>,
) -> Result<ThreadReport, Error> {
    let id = ctx.state().id;
    let (attempts, cleared) = match mode {
        BootMode::Sequencer => {
            let outcome = sequencer.run(&mut ctx);
            (outcome.attempts, outcome.cleared)
        }
        BootMode::Program => {
            let trace = Interpreter::new().run(program, &mut ctx, program.step_bound())?;
            (trace.releases, trace.cleared)
        }
    };
    Ok(ThreadReport {
        id,
        attempts,
        cleared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristics::{BOOT_PC, PERF_COUNTER_BASELINE};

    #[test]
    fn parallel_boot_clears_bank_and_halts_threads() {
        let mut dpu = Dpu::power_on(ResetConfig::default()).expect("valid config");
        let reports = dpu.boot(BootMode::Sequencer).expect("boot");

        assert!(dpu.bank().all_clear());
        assert_eq!(reports.len(), 24);
        assert_eq!(reports.iter().map(|r| r.cleared).sum::<usize>(), 256);
        for state in dpu.threads() {
            assert_eq!(state.perf_config, PERF_COUNTER_BASELINE);
            assert_eq!(state.pc, BOOT_PC);
            assert!(state.halted);
        }
    }

    #[test]
    fn thread_lookup_is_bounded() {
        let dpu = Dpu::new(ResetConfig::new(8, 4)).expect("valid config");
        assert!(dpu.thread(ThreadId(3)).is_ok());
        assert!(matches!(
            dpu.thread(ThreadId(4)),
            Err(Error::ThreadOutOfRange { nr_threads: 4, .. })
        ));
    }

    #[test]
    fn redispatch_requires_halted_thread() {
        let mut dpu = Dpu::new(ResetConfig::new(8, 4)).expect("valid config");
        assert!(matches!(
            dpu.redispatch(ThreadId(0), 0),
            Err(Error::NotHalted { .. })
        ));
        dpu.boot_sequential(BootMode::Program).expect("boot");
        dpu.redispatch(ThreadId(0), 0x80).expect("halted after reset");
        let state = dpu.thread(ThreadId(0)).expect("in range");
        assert!(!state.halted);
        assert_eq!(state.pc, 0x80);
    }

    #[test]
    fn halted_threads_do_not_run_again() {
        let mut dpu = Dpu::power_on(ResetConfig::default()).expect("valid config");
        dpu.boot(BootMode::Sequencer).expect("first boot");
        dpu.bank().acquire(3);

        assert!(matches!(
            dpu.boot(BootMode::Sequencer),
            Err(Error::ThreadHalted { id: ThreadId(0) })
        ));
        assert!(matches!(
            dpu.boot_sequential(BootMode::Program),
            Err(Error::ThreadHalted { .. })
        ));
        assert!(dpu.bank().is_set(3));

        // A partial redispatch still leaves halted threads behind.
        dpu.redispatch(ThreadId(0), 0).expect("halted after reset");
        assert!(matches!(
            dpu.boot(BootMode::Sequencer),
            Err(Error::ThreadHalted { id: ThreadId(1) })
        ));
        assert!(dpu.bank().is_set(3));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            Dpu::new(ResetConfig::new(0, 4)),
            Err(Error::Config(_))
        ));
    }
}

#[cfg(all(test, feature = "snapshot-serde"))]
mod serde_tests {
    use serde::{Serialize, de::DeserializeOwned};

    use super::*;

    fn assert_serde<T: Serialize + DeserializeOwned>(_: &T) {}

    #[test]
    fn snapshot_is_serializable() {
        let mut dpu = Dpu::power_on(ResetConfig::new(8, 4)).expect("valid config");
        dpu.boot(BootMode::Sequencer).expect("boot");
        assert_serde(&dpu.snapshot());
        assert_serde(&dpu.threads()[0]);
    }
}
