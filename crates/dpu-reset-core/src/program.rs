//! Instruction-level form of the bootstrap routine.
//!
//! [`bootstrap_program`] produces the seven-instruction listing the boot
//! section holds, and [`Interpreter`] executes it against any [`ThreadHal`].
//! It must leave exactly the same state as [`ResetSequencer`], which the
//! simulator tests check.
//!
//! [`ResetSequencer`]: crate::sequencer::ResetSequencer

use std::fmt;

use crate::{
    characteristics::{BOOT_PC, PERF_COUNTER_BASELINE},
    config::ResetConfig,
    error::{ConfigError, Error},
    hal::ThreadHal,
    isa::{Cond, Instruction, Reg, Target},
    status::Flags,
};

const BEFORE_RELEASE: Target = 2;
const AFTER_RELEASE: Target = 3;
const RESET_FLAGS: Target = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: Vec<(Target, &'static str)>,
    nr_atomic_bits: u16,
}

/// Builds the bootstrap listing for `config`.
pub fn bootstrap_program(config: &ResetConfig) -> Result<Program, ConfigError> {
    config.validate()?;
    let stride = config.participants();
    let instructions = vec![
        Instruction::Jgtu {
            lhs: Reg::Id,
            imm: u32::from(stride) - 1,
            target: RESET_FLAGS,
        },
        Instruction::SubFromImm {
            dst: Reg::R0,
            imm: i32::from(config.nr_atomic_bits) - 1,
            rhs: Reg::Id,
        },
        Instruction::Release {
            index: Reg::R0,
            offset: 0,
            cond: Cond::Nz,
            target: AFTER_RELEASE,
        },
        Instruction::SubImm {
            dst: Reg::R0,
            lhs: Reg::R0,
            imm: i32::from(stride),
            cond: Cond::Pl,
            target: BEFORE_RELEASE,
        },
        Instruction::AddImm {
            dst: Reg::R0,
            lhs: Reg::Zero,
            imm: PERF_COUNTER_BASELINE,
        },
        Instruction::TimeCfg {
            dst: Reg::Zero,
            src: Reg::R0,
        },
        Instruction::Stop {
            cond: Cond::True,
            pc: BOOT_PC,
        },
    ];
    Ok(Program {
        instructions,
        labels: vec![
            (BEFORE_RELEASE, "before_release"),
            (AFTER_RELEASE, "after_release"),
            (RESET_FLAGS, "reset_flags"),
        ],
        nr_atomic_bits: config.nr_atomic_bits,
    })
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn label_at(&self, target: Target) -> Option<&'static str> {
        self.labels
            .iter()
            .find(|(at, _)| *at == target)
            .map(|(_, name)| *name)
    }

    /// Upper bound on the instructions one thread executes.
    pub fn step_bound(&self) -> usize {
        2 * usize::from(self.nr_atomic_bits) + self.instructions.len()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (at, instr) in self.instructions.iter().enumerate() {
            if let Some(label) = self.label_at(at) {
                writeln!(f, "{label}:")?;
            }
            let target = instr
                .target()
                .and_then(|t| self.label_at(t))
                .unwrap_or_default();
            f.write_str("  ")?;
            instr.write_asm(f, target)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Execution summary of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trace {
    /// Instructions executed, including the final `stop`.
    pub steps: usize,
    /// Release operations that reached the bank.
    pub releases: usize,
    /// Releases that found their bit set.
    pub cleared: usize,
    pub r0: i32,
    pub flags: Flags,
}

/// Executes a [`Program`] on one thread.
///
/// `r0` and the condition flags live in the interpreter. The `add`/`time_cfg`
/// pair is committed through [`ThreadHal::set_flags_and_perf_config`], which
/// performs the same register writes on the thread.
#[derive(Debug, Default)]
pub struct Interpreter {
    pc: Target,
    trace: Trace,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `program` until it stops, or fails after `step_limit` steps.
    pub fn run<H: ThreadHal>(
        mut self,
        program: &Program,
        mut hal: H,
        step_limit: usize,
    ) -> Result<Trace, Error> {
        loop {
            if self.trace.steps >= step_limit {
                return Err(Error::StepLimitExceeded { limit: step_limit });
            }
            let instr = *program
                .instructions
                .get(self.pc)
                .ok_or(Error::ProgramCounterOutOfRange {
                    pc: self.pc as u32,
                    len: program.len(),
                })?;
            self.trace.steps += 1;

            let mut next = self.pc + 1;
            match instr {
                Instruction::Jgtu { lhs, imm, target } => {
                    if self.read(&hal, lhs) as u32 > imm {
                        next = target;
                    }
                }
                Instruction::SubFromImm { dst, imm, rhs } => {
                    let rhs = self.read(&hal, rhs);
                    self.trace.flags = Flags::from_sub(imm as u32, rhs as u32);
                    self.write(dst, imm.wrapping_sub(rhs));
                }
                Instruction::Release {
                    index,
                    offset,
                    cond,
                    target,
                } => {
                    let index = self.read(&hal, index).wrapping_add(offset);
                    let was_set = if (0..i32::from(program.nr_atomic_bits)).contains(&index) {
                        self.trace.releases += 1;
                        hal.release_atomic_bit(index as u16)
                    } else {
                        false
                    };
                    if was_set {
                        self.trace.cleared += 1;
                    }
                    if holds(cond, i32::from(was_set)) {
                        next = target;
                    }
                }
                Instruction::SubImm {
                    dst,
                    lhs,
                    imm,
                    cond,
                    target,
                } => {
                    let lhs = self.read(&hal, lhs);
                    let result = lhs.wrapping_sub(imm);
                    self.trace.flags = Flags::from_sub(lhs as u32, imm as u32);
                    self.write(dst, result);
                    if holds(cond, result) {
                        next = target;
                    }
                }
                Instruction::AddImm { dst, lhs, imm } => {
                    let lhs = self.read(&hal, lhs);
                    self.trace.flags = Flags::from_add(lhs as u32, imm);
                    self.write(dst, lhs.wrapping_add(imm as i32));
                }
                Instruction::TimeCfg { src, .. } => {
                    let value = self.read(&hal, src) as u32;
                    // The HAL derives the thread's flags from `add r0, zero, value`,
                    // so the preceding add must have produced the same ones.
                    debug_assert_eq!(self.trace.flags, Flags::from_add(0, value));
                    hal.set_flags_and_perf_config(value);
                }
                Instruction::Stop { cond, pc } => {
                    if holds(cond, 1) {
                        hal.halt_to(pc);
                        tracing::trace!(
                            thread = %hal.read_thread_id(),
                            steps = self.trace.steps,
                            "stop"
                        );
                        return Ok(self.trace);
                    }
                }
            }
            self.pc = next;
        }
    }

    fn read<H: ThreadHal>(&self, hal: &H, reg: Reg) -> i32 {
        match reg {
            Reg::R0 => self.trace.r0,
            Reg::Zero => 0,
            Reg::Id => i32::from(hal.read_thread_id().0),
        }
    }

    fn write(&mut self, reg: Reg, value: i32) {
        // `zero` and `id` ignore writes.
        if reg == Reg::R0 {
            self.trace.r0 = value;
        }
    }
}

fn holds(cond: Cond, value: i32) -> bool {
    match cond {
        Cond::True => true,
        Cond::Nz => value != 0,
        Cond::Pl => value >= 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atomic::AtomicBitBank,
        thread::{ThreadContext, ThreadId, ThreadState},
    };

    #[test]
    fn listing_matches_boot_section() {
        let program = bootstrap_program(&ResetConfig::default()).expect("valid config");
        let expected = "\
  jgtu id, 15, reset_flags
  sub r0, 255, id
before_release:
  release r0, 0, nz, after_release
after_release:
  sub r0, r0, 16, pl, before_release
reset_flags:
  add r0, zero, 7
  time_cfg zero, r0
  stop true, 0
";
        assert_eq!(program.to_string(), expected);
    }

    #[test]
    fn interpreter_clears_partition_and_halts() {
        let config = ResetConfig::new(24, 24);
        let program = bootstrap_program(&config).expect("valid config");
        let bank = AtomicBitBank::new(24);
        bank.fill(true);
        let mut state = ThreadState::power_on(ThreadId(7));

        let trace = Interpreter::new()
            .run(&program, ThreadContext::new(&mut state, &bank), program.step_bound())
            .expect("program stops");

        assert_eq!(trace.steps, 9);
        assert_eq!(trace.releases, 2);
        assert_eq!(trace.cleared, 2);
        assert!(!bank.is_set(16));
        assert!(!bank.is_set(0));
        assert_eq!(bank.set_count(), 22);
        assert_eq!(trace.r0, 7);
        assert!(trace.flags.is_empty());
        assert_eq!(trace.flags, state.flags);
        assert_eq!(trace.r0, state.r0);
        assert!(state.is_baseline());
    }

    #[test]
    fn ineligible_thread_skips_release() {
        let config = ResetConfig::new(24, 24);
        let program = bootstrap_program(&config).expect("valid config");
        let bank = AtomicBitBank::new(24);
        bank.fill(true);
        let mut state = ThreadState::power_on(ThreadId(20));

        let trace = Interpreter::new()
            .run(&program, ThreadContext::new(&mut state, &bank), 64)
            .expect("program stops");

        assert_eq!(trace.releases, 0);
        assert_eq!(trace.steps, 4);
        assert_eq!(bank.set_count(), 24);
        assert!(state.is_baseline());
    }

    #[test]
    fn step_limit_is_enforced() {
        let program = bootstrap_program(&ResetConfig::default()).expect("valid config");
        let bank = AtomicBitBank::new(256);
        let mut state = ThreadState::power_on(ThreadId(0));
        let err = Interpreter::new()
            .run(&program, ThreadContext::new(&mut state, &bank), 3)
            .unwrap_err();
        assert!(matches!(err, Error::StepLimitExceeded { limit: 3 }));
        assert!(!state.halted);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ResetConfig::new(16, 4).with_ceiling(0);
        assert_eq!(bootstrap_program(&config), Err(ConfigError::ZeroCeiling));
    }
}
