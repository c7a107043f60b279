//! The slice of the DPU instruction set the bootstrap routine uses.

use std::fmt;

/// Register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    R0,
    /// Hard-wired zero.
    Zero,
    /// Read-only thread id.
    Id,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reg::R0 => "r0",
            Reg::Zero => "zero",
            Reg::Id => "id",
        })
    }
}

/// Branch condition attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    /// Always taken.
    True,
    /// Source (or released bit) nonzero.
    Nz,
    /// Result positive or zero.
    Pl,
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cond::True => "true",
            Cond::Nz => "nz",
            Cond::Pl => "pl",
        })
    }
}

/// Jump target, an index into the program.
pub type Target = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `jgtu lhs, imm, target`: jump when `lhs > imm` (unsigned).
    Jgtu { lhs: Reg, imm: u32, target: Target },
    /// `sub dst, imm, rhs`: `dst = imm - rhs`.
    SubFromImm { dst: Reg, imm: i32, rhs: Reg },
    /// `release index, offset, cond, target`: clears atomic bit
    /// `index + offset`, jumping when the bit was set.
    Release {
        index: Reg,
        offset: i32,
        cond: Cond,
        target: Target,
    },
    /// `sub dst, lhs, imm, cond, target`: `dst = lhs - imm`, jumping on `cond`.
    SubImm {
        dst: Reg,
        lhs: Reg,
        imm: i32,
        cond: Cond,
        target: Target,
    },
    /// `add dst, lhs, imm`.
    AddImm { dst: Reg, lhs: Reg, imm: u32 },
    /// `time_cfg dst, src`: writes `src` into the performance-counter
    /// configuration register.
    TimeCfg { dst: Reg, src: Reg },
    /// `stop cond, pc`: halts the thread, recording `pc` for the next dispatch.
    Stop { cond: Cond, pc: u32 },
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Jgtu { .. } => "jgtu",
            Instruction::SubFromImm { .. } | Instruction::SubImm { .. } => "sub",
            Instruction::Release { .. } => "release",
            Instruction::AddImm { .. } => "add",
            Instruction::TimeCfg { .. } => "time_cfg",
            Instruction::Stop { .. } => "stop",
        }
    }

    pub fn target(&self) -> Option<Target> {
        match *self {
            Instruction::Jgtu { target, .. }
            | Instruction::Release { target, .. }
            | Instruction::SubImm { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Writes the assembly form, naming the jump target with `label`.
    pub fn write_asm(&self, f: &mut dyn fmt::Write, label: &str) -> fmt::Result {
        let m = self.mnemonic();
        match *self {
            Instruction::Jgtu { lhs, imm, .. } => write!(f, "{m} {lhs}, {imm}, {label}"),
            Instruction::SubFromImm { dst, imm, rhs } => write!(f, "{m} {dst}, {imm}, {rhs}"),
            Instruction::Release {
                index,
                offset,
                cond,
                ..
            } => write!(f, "{m} {index}, {offset}, {cond}, {label}"),
            Instruction::SubImm {
                dst, lhs, imm, cond, ..
            } => write!(f, "{m} {dst}, {lhs}, {imm}, {cond}, {label}"),
            Instruction::AddImm { dst, lhs, imm } => write!(f, "{m} {dst}, {lhs}, {imm}"),
            Instruction::TimeCfg { dst, src } => write!(f, "{m} {dst}, {src}"),
            Instruction::Stop { cond, pc } => write!(f, "{m} {cond}, {pc}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.target().map(|t| format!("@{t}")).unwrap_or_default();
        self.write_asm(f, &label)
    }
}
