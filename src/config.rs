//! Command-line configuration and argument validation.

use std::path::PathBuf;

use clap::Parser;
use k256::ProjectivePoint;
use num_bigint::BigUint;

use crate::error::SolverError;
use crate::math::secp;

/// Interval ECDLP solver for secp256k1 (Pollard's kangaroo with
/// distinguished points).
#[derive(Parser, Debug, Clone)]
#[command(name = "rangeroo", version, about, long_about = None)]
pub struct Config {
    /// Target public key, SEC1 hex (compressed or uncompressed)
    pub target: String,

    /// Lower bound of the key interval (hex or decimal)
    pub start_range: String,

    /// Upper bound of the key interval (hex or decimal)
    pub end_range: String,

    /// CPU worker count (default: hardware concurrency)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Drive the search through the batched accelerator back end
    #[arg(long)]
    pub gpu: bool,

    /// Distinguished-point bits, 1..=24 (default: auto-tuned from the range)
    #[arg(long = "dp")]
    pub dp_bits: Option<u32>,

    /// Accelerator batch size
    #[arg(long, default_value_t = 16384)]
    pub batch: usize,

    /// Accelerator steps per launch
    #[arg(long, default_value_t = 256)]
    pub steps: u32,

    /// Load a checkpoint before starting
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Checkpoint path for auto-save and the final save
    #[arg(long, default_value = "kangaroo.checkpoint")]
    pub checkpoint: PathBuf,

    /// Pin the walk RNG (useful for reproducing runs)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn num_threads(&self) -> usize {
        match self.threads {
            Some(threads) => threads,
            None => {
                let detected = num_cpus::get();
                if detected == 0 {
                    4
                } else {
                    detected
                }
            }
        }
    }

    pub fn parse_target(&self) -> Result<ProjectivePoint, SolverError> {
        let hex_str = self
            .target
            .strip_prefix("0x")
            .unwrap_or(self.target.as_str());
        let bytes = hex::decode(hex_str).map_err(|_| {
            SolverError::InvalidInput(format!(
                "target public key is not valid hex: {}",
                self.target
            ))
        })?;
        secp::parse_point(&bytes)
    }

    pub fn parse_ranges(&self) -> Result<(BigUint, BigUint), SolverError> {
        let start = parse_range_arg(&self.start_range)?;
        let end = parse_range_arg(&self.end_range)?;
        if start >= end {
            return Err(SolverError::InvalidInput(
                "start of the range must be strictly below its end".into(),
            ));
        }
        Ok((start, end))
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if let Some(bits) = self.dp_bits {
            if !(1..=24).contains(&bits) {
                return Err(SolverError::InvalidInput(format!(
                    "dp bits must be within 1..=24, got {bits}"
                )));
            }
        }
        if self.num_threads() == 0 {
            return Err(SolverError::InvalidInput("thread count must be > 0".into()));
        }
        if self.gpu && (self.batch == 0 || self.steps == 0) {
            return Err(SolverError::InvalidInput(
                "accelerator batch and steps must be > 0".into(),
            ));
        }
        self.parse_target()?;
        self.parse_ranges()?;
        Ok(())
    }
}

/// Range bound: hex with or without `0x`, or decimal. Bare strings of
/// digits are read as decimal; anything with hex letters as hex.
pub fn parse_range_arg(s: &str) -> Result<BigUint, SolverError> {
    let trimmed = s.trim();
    let parsed = if let Some(hex_part) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        BigUint::parse_bytes(hex_part.as_bytes(), 16)
    } else if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        BigUint::parse_bytes(trimmed.as_bytes(), 10)
    } else {
        BigUint::parse_bytes(trimmed.as_bytes(), 16)
    };
    parsed.ok_or_else(|| SolverError::InvalidInput(format!("cannot parse range bound: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        Config::try_parse_from(args).unwrap()
    }

    fn target_hex() -> String {
        let point = secp::mul_generator(&BigUint::from(0x1234u32));
        hex::encode(secp::serialize_compressed(&point).unwrap())
    }

    #[test]
    fn range_args_accept_hex_and_decimal() {
        assert_eq!(parse_range_arg("0x10").unwrap(), BigUint::from(16u32));
        assert_eq!(parse_range_arg("0X10").unwrap(), BigUint::from(16u32));
        assert_eq!(parse_range_arg("10").unwrap(), BigUint::from(10u32));
        assert_eq!(parse_range_arg("ff").unwrap(), BigUint::from(255u32));
        assert!(parse_range_arg("zz").is_err());
        assert!(parse_range_arg("").is_err());
    }

    #[test]
    fn validate_accepts_a_sane_invocation() {
        let target = target_hex();
        let cfg = config(&["rangeroo", &target, "0x1000", "0x2000"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        let target = target_hex();
        let cfg = config(&["rangeroo", &target, "0x2000", "0x1000"]);
        assert!(matches!(
            cfg.validate(),
            Err(SolverError::InvalidInput(_))
        ));
        let cfg = config(&["rangeroo", &target, "0x2000", "0x2000"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_dp_bits() {
        let target = target_hex();
        let cfg = config(&["rangeroo", &target, "1", "100", "--dp", "0"]);
        assert!(cfg.validate().is_err());
        let cfg = config(&["rangeroo", &target, "1", "100", "--dp", "25"]);
        assert!(cfg.validate().is_err());
        let cfg = config(&["rangeroo", &target, "1", "100", "--dp", "24"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_a_bad_target() {
        let cfg = config(&["rangeroo", "02zz", "1", "100"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accelerator_defaults_follow_the_binary() {
        let target = target_hex();
        let cfg = config(&["rangeroo", &target, "1", "100", "--gpu"]);
        assert_eq!(cfg.batch, 16384);
        assert_eq!(cfg.steps, 256);
    }
}
