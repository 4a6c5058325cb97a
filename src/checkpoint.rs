//! Plain-text checkpoint format (version tag `V1`).
//!
//! ```text
//! V1
//! TOTAL_JUMPS <u64>
//! DURATION <float seconds>
//! DP_BITS <int>
//! DISTINGUISHED_POINTS <count>
//! <compressed_hex> <distance_hex> <is_tame 0|1>
//! ...
//! GPU_POINTS <byte_count>
//! <hex blob, empty line when 0>
//! GPU_DISTS <byte_count>
//! <hex blob, empty line when 0>
//! ```
//!
//! Loading parses the whole file into a detached [`Checkpoint`] before the
//! caller touches any live state, so a corrupt file can never half-apply.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use num_bigint::BigUint;

use crate::error::SolverError;
use crate::kangaroo::stepper::Herd;
use crate::utils::encoding;

#[derive(Debug, Default)]
pub struct Checkpoint {
    pub total_jumps: u64,
    pub duration: f64,
    pub dp_bits: u32,
    pub records: Vec<([u8; 33], BigUint, Herd)>,
    pub gpu_points: Vec<u8>,
    pub gpu_dists: Vec<u8>,
}

impl Checkpoint {
    /// Write to `path` via a temp file and an atomic rename, so a crash
    /// mid-save never clobbers the previous checkpoint.
    pub fn save(&self, path: &Path) -> Result<(), SolverError> {
        let tmp_path = path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            writeln!(out, "V1")?;
            writeln!(out, "TOTAL_JUMPS {}", self.total_jumps)?;
            writeln!(out, "DURATION {}", self.duration)?;
            writeln!(out, "DP_BITS {}", self.dp_bits)?;
            writeln!(out, "DISTINGUISHED_POINTS {}", self.records.len())?;
            for (key, distance, herd) in &self.records {
                writeln!(
                    out,
                    "{} {} {}",
                    hex::encode(key),
                    encoding::biguint_to_hex(distance),
                    if herd.is_tame() { 1 } else { 0 }
                )?;
            }
            writeln!(out, "GPU_POINTS {}", self.gpu_points.len())?;
            writeln!(out, "{}", hex::encode(&self.gpu_points))?;
            writeln!(out, "GPU_DISTS {}", self.gpu_dists.len())?;
            writeln!(out, "{}", hex::encode(&self.gpu_dists))?;
            out.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Checkpoint, SolverError> {
        let content = fs::read_to_string(path)?;
        let mut lines = content.lines().peekable();

        match lines.next() {
            Some("V1") => {}
            Some(tag) => {
                return Err(SolverError::CheckpointCorrupt(format!(
                    "unknown version tag {tag:?}"
                )))
            }
            None => return Err(SolverError::CheckpointCorrupt("empty file".into())),
        }

        let mut checkpoint = Checkpoint::default();
        while let Some(line) = lines.next() {
            let mut fields = line.split_whitespace();
            let label = match fields.next() {
                Some(label) => label,
                None => continue,
            };
            match label {
                "TOTAL_JUMPS" => {
                    checkpoint.total_jumps = parse_field(fields.next(), "TOTAL_JUMPS")?;
                }
                "DURATION" => {
                    checkpoint.duration = parse_field(fields.next(), "DURATION")?;
                }
                "DP_BITS" => {
                    let bits: u32 = parse_field(fields.next(), "DP_BITS")?;
                    if !(1..=24).contains(&bits) {
                        return Err(SolverError::CheckpointCorrupt(format!(
                            "DP_BITS {bits} outside 1..=24"
                        )));
                    }
                    checkpoint.dp_bits = bits;
                }
                "DISTINGUISHED_POINTS" => {
                    let count: usize = parse_field(fields.next(), "DISTINGUISHED_POINTS")?;
                    checkpoint.records.reserve(count);
                    for _ in 0..count {
                        let record_line = lines.next().ok_or_else(|| {
                            SolverError::CheckpointCorrupt(
                                "fewer distinguished-point lines than declared".into(),
                            )
                        })?;
                        checkpoint.records.push(parse_record(record_line)?);
                    }
                }
                "GPU_POINTS" => {
                    checkpoint.gpu_points = parse_blob(&mut lines, fields.next(), "GPU_POINTS")?;
                }
                "GPU_DISTS" => {
                    checkpoint.gpu_dists = parse_blob(&mut lines, fields.next(), "GPU_DISTS")?;
                }
                other => {
                    return Err(SolverError::CheckpointCorrupt(format!(
                        "unknown field {other:?}"
                    )))
                }
            }
        }
        Ok(checkpoint)
    }
}

fn parse_field<T: std::str::FromStr>(
    value: Option<&str>,
    label: &str,
) -> Result<T, SolverError> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| SolverError::CheckpointCorrupt(format!("malformed {label} field")))
}

fn parse_record(line: &str) -> Result<([u8; 33], BigUint, Herd), SolverError> {
    let mut fields = line.split_whitespace();
    let (key_hex, dist_hex, tame_flag) = match (fields.next(), fields.next(), fields.next()) {
        (Some(key), Some(dist), Some(flag)) => (key, dist, flag),
        _ => {
            return Err(SolverError::CheckpointCorrupt(format!(
                "malformed distinguished-point line {line:?}"
            )))
        }
    };

    let key_bytes = hex::decode(key_hex)
        .map_err(|_| SolverError::CheckpointCorrupt("distinguished point is not hex".into()))?;
    let key: [u8; 33] = key_bytes.try_into().map_err(|_| {
        SolverError::CheckpointCorrupt("distinguished point is not 33 bytes".into())
    })?;

    let distance = encoding::hex_to_biguint(dist_hex)
        .ok_or_else(|| SolverError::CheckpointCorrupt("distance is not hex".into()))?;

    let herd = match tame_flag {
        "1" => Herd::Tame,
        "0" => Herd::Wild,
        other => {
            return Err(SolverError::CheckpointCorrupt(format!(
                "herd flag must be 0 or 1, got {other:?}"
            )))
        }
    };
    Ok((key, distance, herd))
}

fn parse_blob<'a>(
    lines: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
    count: Option<&str>,
    label: &str,
) -> Result<Vec<u8>, SolverError> {
    let count: usize = parse_field(count, label)?;
    if count == 0 {
        // the grammar carries an empty blob line; tolerate writers that
        // drop it entirely
        if lines.peek().is_some_and(|line| line.trim().is_empty()) {
            lines.next();
        }
        return Ok(Vec::new());
    }
    let blob_line = lines
        .next()
        .ok_or_else(|| SolverError::CheckpointCorrupt(format!("missing {label} blob")))?;
    let blob = hex::decode(blob_line.trim())
        .map_err(|_| SolverError::CheckpointCorrupt(format!("{label} blob is not hex")))?;
    if blob.len() != count {
        return Err(SolverError::CheckpointCorrupt(format!(
            "{label} blob is {} bytes, header says {count}",
            blob.len()
        )));
    }
    Ok(blob)
}
