//! Chip revision selection.
//!
//! The revision decides the bank geometry and whether the atomic reset
//! erratum applies. Host tooling picks it from `DPU_ARCH_VERSION`, falling
//! back to the chip id exposed by the rank driver.

use std::{fmt, fs, path::Path, str::FromStr};

use crate::{
    characteristics::{DPU_NR_ATOMIC_BITS, DPU_NR_THREADS},
    error::ConfigError,
};

/// Environment variable overriding revision detection.
pub const ARCH_VERSION_ENV: &str = "DPU_ARCH_VERSION";

/// Chip id file of the first rank, when the rank driver is loaded.
pub const CHIP_ID_PATH: &str = "/sys/class/dpu_rank/dpu_rank0/dpu_chip_id";

/// Chip ids above this value are v1B parts.
const LAST_V1A_CHIP_ID: u32 = 8;

/// Geometry of the hardware the reset runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Characteristics {
    pub nr_atomic_bits: u16,
    pub nr_threads: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChipRevision {
    #[default]
    V1A,
    V1B,
}

impl ChipRevision {
    /// Detects the revision of the local hardware.
    pub fn detect() -> Self {
        let env = std::env::var(ARCH_VERSION_ENV).ok();
        Self::detect_from(env.as_deref(), || read_chip_id(Path::new(CHIP_ID_PATH)))
    }

    /// Detection core: an explicit, non-empty override wins, then the chip id,
    /// then `V1A`.
    pub fn detect_from<F>(env: Option<&str>, chip_id: F) -> Self
    where
        F: FnOnce() -> Option<u32>,
    {
        if let Some(value) = env.filter(|v| !v.is_empty()) {
            match value.parse() {
                Ok(revision) => return revision,
                Err(err) => tracing::warn!("ignoring {ARCH_VERSION_ENV}: {err}"),
            }
        }
        match chip_id() {
            Some(id) if id > LAST_V1A_CHIP_ID => ChipRevision::V1B,
            _ => ChipRevision::V1A,
        }
    }

    pub fn characteristics(self) -> Characteristics {
        // Both revisions share the bank geometry; they differ in the erratum.
        Characteristics {
            nr_atomic_bits: DPU_NR_ATOMIC_BITS,
            nr_threads: DPU_NR_THREADS,
        }
    }

    /// Whether the atomic reset must be limited to
    /// [`NR_THREADS_TO_RESET_ATOMIC_BITS`](crate::characteristics::NR_THREADS_TO_RESET_ATOMIC_BITS)
    /// threads.
    pub fn has_atomic_reset_erratum(self) -> bool {
        matches!(self, ChipRevision::V1A)
    }
}

fn read_chip_id(path: &Path) -> Option<u32> {
    let text = fs::read_to_string(path).ok()?;
    text.lines().next()?.trim().parse().ok()
}

impl FromStr for ChipRevision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1A" => Ok(ChipRevision::V1A),
            "v1B" => Ok(ChipRevision::V1B),
            other => Err(ConfigError::UnknownRevision(other.to_string())),
        }
    }
}

impl fmt::Display for ChipRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChipRevision::V1A => f.write_str("v1A"),
            ChipRevision::V1B => f.write_str("v1B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_over_chip_id() {
        let revision = ChipRevision::detect_from(Some("v1A"), || Some(12));
        assert_eq!(revision, ChipRevision::V1A);
    }

    #[test]
    fn chip_id_above_eight_is_v1b() {
        assert_eq!(ChipRevision::detect_from(None, || Some(9)), ChipRevision::V1B);
        assert_eq!(ChipRevision::detect_from(None, || Some(8)), ChipRevision::V1A);
    }

    #[test]
    fn empty_or_bogus_env_falls_through() {
        assert_eq!(ChipRevision::detect_from(Some(""), || Some(10)), ChipRevision::V1B);
        assert_eq!(ChipRevision::detect_from(Some("v2"), || None), ChipRevision::V1A);
    }

    #[test]
    fn missing_chip_id_file_is_none() {
        assert_eq!(read_chip_id(Path::new("/nonexistent/dpu_chip_id")), None);
    }

    #[test]
    fn revision_strings_round_trip() {
        for revision in [ChipRevision::V1A, ChipRevision::V1B] {
            assert_eq!(revision.to_string().parse::<ChipRevision>(), Ok(revision));
        }
        assert_eq!(
            "v1C".parse::<ChipRevision>(),
            Err(ConfigError::UnknownRevision("v1C".into()))
        );
    }
}
