//! Walker state machine for the tame and wild herds.

use k256::ProjectivePoint;
use num_bigint::BigUint;

use crate::error::SolverError;
use crate::kangaroo::jump_table::{jump_index, JumpEntry};
use crate::math::secp;

/// Herd membership. Tame walkers track an absolute scalar, wild walkers an
/// offset added to the target point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Herd {
    Tame,
    Wild,
}

impl Herd {
    pub fn is_tame(self) -> bool {
        matches!(self, Herd::Tame)
    }

    /// Accelerator slot convention: even slots tame, odd slots wild.
    pub fn from_slot(slot: usize) -> Self {
        if slot % 2 == 0 {
            Herd::Tame
        } else {
            Herd::Wild
        }
    }
}

/// A single kangaroo: current position, accumulated distance and herd tag.
///
/// Invariants: tame `point == distance * G`, wild `point == T + distance * G`.
/// The distance is kept unreduced during the walk; it only meets the group
/// order in collision resolution.
pub struct Walker {
    pub point: ProjectivePoint,
    pub distance: BigUint,
    pub herd: Herd,
    compressed: [u8; 33],
}

impl Walker {
    /// Seed a tame walker at an absolute scalar (the range end plus a small
    /// offset, so the herd starts ahead of every key in the interval).
    pub fn tame(start: BigUint) -> Result<Self, SolverError> {
        let point = secp::mul_generator(&start);
        let compressed = secp::serialize_compressed(&point)?;
        Ok(Walker {
            point,
            distance: start,
            herd: Herd::Tame,
            compressed,
        })
    }

    /// Seed a wild walker at `T + offset*G`.
    pub fn wild(target: &ProjectivePoint, offset: BigUint) -> Result<Self, SolverError> {
        let point = secp::add_scalar(target, &offset);
        let compressed = secp::serialize_compressed(&point)?;
        Ok(Walker {
            point,
            distance: offset,
            herd: Herd::Wild,
            compressed,
        })
    }

    /// Advance one jump and return the compressed encoding of the new point,
    /// so the caller can apply the distinguished-point predicate without a
    /// second serialization.
    pub fn step(&mut self, table: &[JumpEntry]) -> Result<&[u8; 33], SolverError> {
        let entry = &table[jump_index(&self.compressed)];
        self.point += entry.point;
        self.distance += &entry.delta;
        self.compressed = secp::serialize_compressed(&self.point)?;
        Ok(&self.compressed)
    }

    pub fn compressed(&self) -> &[u8; 33] {
        &self.compressed
    }
}

/// A point is distinguished iff the last `dp_bits` bits of its compressed
/// encoding are zero, consuming whole trailing bytes first when
/// `dp_bits >= 8`.
pub fn is_distinguished(compressed: &[u8], dp_bits: u32) -> bool {
    let mut remaining = dp_bits;
    let mut idx = compressed.len();
    while remaining >= 8 {
        idx -= 1;
        if compressed[idx] != 0 {
            return false;
        }
        remaining -= 8;
    }
    if remaining > 0 {
        let mask = (1u8 << remaining) - 1;
        if compressed[idx - 1] & mask != 0 {
            return false;
        }
    }
    true
}
