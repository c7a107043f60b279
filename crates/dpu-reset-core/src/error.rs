use thiserror::Error;

use crate::thread::ThreadId;

/// Rejected reset configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("atomic bank must hold at least one bit")]
    NoAtomicBits,

    #[error("at least one hardware thread is required")]
    NoThreads,

    #[error("atomic reset ceiling must be at least 1")]
    ZeroCeiling,

    #[error("unknown chip revision: {0}")]
    UnknownRevision(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("thread {id} out of range (DPU has {nr_threads} threads)")]
    ThreadOutOfRange { id: ThreadId, nr_threads: u8 },

    #[error("program counter {pc} outside of a {len}-instruction program")]
    ProgramCounterOutOfRange { pc: u32, len: usize },

    #[error("program did not stop within {limit} steps")]
    StepLimitExceeded { limit: usize },

    #[error("host thread running thread {id} panicked")]
    ThreadPanicked { id: ThreadId },

    #[error("thread {id} is still runnable")]
    NotHalted { id: ThreadId },

    #[error("thread {id} is halted and was not redispatched")]
    ThreadHalted { id: ThreadId },
}
