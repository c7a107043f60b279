//! Power-on reset of DPU hardware threads and a behavioral model to run it on.
//!
//! [`sequencer::ResetSequencer`] is the reset itself, written against the
//! [`hal::ThreadHal`] register interface. [`program`] holds the same routine
//! as the instruction listing placed in the boot section, and [`dpu::Dpu`]
//! boots a whole set of simulated threads concurrently.

pub mod atomic;
pub mod characteristics;
pub mod chip;
pub mod config;
pub mod dpu;
pub mod error;
pub mod hal;
pub mod isa;
pub mod program;
pub mod sequencer;
pub mod status;
pub mod thread;

pub use chip::ChipRevision;
pub use config::ResetConfig;
pub use dpu::{BootMode, Dpu, DpuSnapshot, ThreadReport};
pub use error::{ConfigError, Error};
pub use hal::ThreadHal;
pub use sequencer::{ResetOutcome, ResetSequencer};
pub use thread::{ThreadId, ThreadState};

#[cfg(test)]
mod tests {
    use ctor::ctor;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[ctor]
    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::DEBUG)
            .pretty()
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
    }
}
