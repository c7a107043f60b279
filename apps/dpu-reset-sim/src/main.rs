use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use dpu_reset_core::{
    BootMode, ChipRevision, Dpu, ResetConfig, ThreadId,
    characteristics::{BOOTSTRAP_SECTION, BOOTSTRAP_SYMBOL},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Structured reset sequence
    Sequencer,
    /// Instruction-level bootstrap listing
    Program,
}

impl From<Mode> for BootMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sequencer => BootMode::Sequencer,
            Mode::Program => BootMode::Program,
        }
    }
}

/// DPU thread reset simulator
#[derive(Parser, Debug)]
#[command(name = "dpu-reset-sim")]
#[command(about = "Boots a simulated DPU and checks the post-reset baseline", long_about = None)]
struct Args {
    /// Chip revision (v1A, v1B). Detected from DPU_ARCH_VERSION / the rank driver when omitted.
    #[arg(short, long)]
    revision: Option<ChipRevision>,

    /// Override the number of atomic bits
    #[arg(long)]
    atomic_bits: Option<u16>,

    /// Override the number of hardware threads
    #[arg(long)]
    threads: Option<u8>,

    /// Override the atomic reset ceiling (16 on chips with the erratum)
    #[arg(long)]
    ceiling: Option<u8>,

    /// How each thread executes the reset
    #[arg(long, value_enum, default_value = "sequencer")]
    mode: Mode,

    /// Run threads one after another instead of concurrently
    #[arg(long)]
    sequential: bool,

    /// Print the bootstrap listing before booting
    #[arg(long)]
    listing: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let revision = args.revision.unwrap_or_else(ChipRevision::detect);
    let mut config = ResetConfig::for_revision(revision);
    if let Some(bits) = args.atomic_bits {
        config.nr_atomic_bits = bits;
    }
    if let Some(threads) = args.threads {
        config.nr_threads = threads;
    }
    if let Some(ceiling) = args.ceiling {
        if revision.has_atomic_reset_erratum() && ceiling > config.ceiling {
            warn!(
                "{revision} chips only clear atomic bits reliably with up to {} threads",
                config.ceiling
            );
        }
        config = config.with_ceiling(ceiling);
    }

    info!(
        "revision {revision}: {} atomic bits, {} threads, ceiling {}",
        config.nr_atomic_bits, config.nr_threads, config.ceiling
    );

    let mut dpu = Dpu::power_on(config).context("building simulated DPU")?;
    if args.listing {
        println!(
            "  .section {BOOTSTRAP_SECTION}\n{BOOTSTRAP_SYMBOL}:\n{}",
            dpu.program()
        );
    }

    let mode = BootMode::from(args.mode);
    let reports = if args.sequential {
        dpu.boot_sequential(mode)
    } else {
        dpu.boot(mode)
    }
    .context("booting threads")?;

    for report in &reports {
        let indices: Vec<u16> = dpu.sequencer().partition(report.id).collect();
        let state = dpu.thread(report.id)?;
        println!(
            "thread {:2}: {} releases ({} set) {:?} -> {}",
            report.id, report.attempts, report.cleared, indices, state
        );
    }

    let leftover = dpu.bank().set_count();
    if leftover != 0 {
        bail!("{leftover} atomic bits still set after reset");
    }
    let off_baseline: Vec<ThreadId> = dpu
        .threads()
        .iter()
        .filter(|state| !state.is_baseline())
        .map(|state| state.id)
        .collect();
    if !off_baseline.is_empty() {
        bail!("threads not at baseline after reset: {off_baseline:?}");
    }

    info!(
        "all {} atomic bits clear, {} threads halted at baseline",
        config.nr_atomic_bits,
        reports.len()
    );
    Ok(())
}
