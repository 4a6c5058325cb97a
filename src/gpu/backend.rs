//! Accelerator contract for batched walker advancement.
//!
//! The driver holds a back end as a narrow capability: ingest the jump
//! table once, then repeatedly advance a fleet of walker slots stored in two
//! flat byte arrays. Implementations may be GPU kernels, host SIMD code or
//! the reference CPU loop in [`crate::gpu::cpu_backend`].

use crate::error::SolverError;
use crate::kangaroo::jump_table::JumpEntry;

/// Upper bound on distinguished hits one launch may return. The driver
/// keeps `batch * steps * 2^-dp_bits` at or below half of this.
pub const DP_CAP: usize = 4096;

/// Bytes per slot in the points array: uncompressed affine X || Y.
pub const POINT_LANE: usize = 64;

/// Bytes per slot in the distances array: big-endian scalar.
pub const DIST_LANE: usize = 32;

/// A slot that hit a distinguished point during a launch. Coordinates are
/// big-endian affine; `distance` is the slot's scalar at the moment of the
/// first hit within the launch.
#[derive(Clone, Debug)]
pub struct FoundDp {
    pub slot: u32,
    pub x: [u8; 32],
    pub y: [u8; 32],
    pub distance: [u8; 32],
}

/// Arithmetic probes used by the driver's startup self-test.
#[derive(Clone, Copy, Debug)]
pub enum MathTest {
    /// a, b: 64-byte points (X || Y); result: 64-byte point.
    PointAdd,
    /// a: 64-byte point, b: 32-byte scalar; result: 64-byte point.
    PointMul,
    /// a: 32-byte scalar; result: its inverse mod n, 32 bytes.
    ModInverse,
    /// a, b: 32-byte scalars; result: (a + b) mod n, 32 bytes.
    ScalarAddModN,
}

pub trait Accelerator: Send {
    /// Ingest the jump table. Later calls may assume it is constant.
    fn init(&mut self, table: &[JumpEntry]) -> Result<(), SolverError>;

    /// Advance every slot by `steps` jumps, modifying `points` and
    /// `distances` in place. Distance additions are performed mod n.
    ///
    /// Returns every slot that hit a distinguished point during the launch,
    /// carrying the state of the first hit, up to [`DP_CAP`] entries.
    fn run_step(
        &mut self,
        points: &mut [u8],
        distances: &mut [u8],
        steps: u32,
        dp_bits: u32,
    ) -> Result<Vec<FoundDp>, SolverError>;

    /// Arithmetic probe; only used by the startup self-test.
    fn run_math_test(&mut self, op: MathTest, a: &[u8], b: &[u8]) -> Result<Vec<u8>, SolverError>;
}
