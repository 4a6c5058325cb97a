//! Jump-table construction for the pseudo-random walk.
//!
//! Both herds share one immutable table of `(delta, delta*G)` pairs; the
//! next jump is a deterministic function of the current point, so two
//! walkers that land on the same point follow the same path from there on.

use k256::ProjectivePoint;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;

use crate::math::secp;

/// Number of entries. A power of two, so the hop rule can take the last
/// serialized byte modulo the table size.
pub const TABLE_SIZE: usize = 32;

/// One precomputed jump. Invariant: `point == delta * G`.
#[derive(Clone)]
pub struct JumpEntry {
    pub delta: BigUint,
    pub point: ProjectivePoint,
}

/// Build the walk table for a range of size `range_size`.
///
/// Distances are drawn around `sqrt(R)/2` so the expected walk speed matches
/// the lambda-method analysis; a draw at or above the range collapses to
/// `R/2 + 1`.
pub fn build<R: Rng + ?Sized>(range_size: &BigUint, rng: &mut R) -> Vec<JumpEntry> {
    let mut mean: BigUint = range_size.sqrt() >> 1;
    if mean.is_zero() {
        mean = BigUint::one();
    }
    let low = (&mean >> 1) + 1u32;

    let mut table = Vec::with_capacity(TABLE_SIZE);
    for _ in 0..TABLE_SIZE {
        let mut delta = rng.gen_biguint_below(&mean) + &low;
        if delta >= *range_size {
            delta = (range_size >> 1) + 1u32;
        }
        let point = secp::mul_generator(&delta);
        table.push(JumpEntry { delta, point });
    }
    table
}

/// Deterministic, herd-agnostic hop rule over the compressed encoding.
#[inline]
pub fn jump_index(compressed: &[u8; 33]) -> usize {
    compressed[32] as usize % TABLE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn range(bits: u32) -> BigUint {
        BigUint::one() << bits
    }

    #[test]
    fn table_has_fixed_size() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(build(&range(32), &mut rng).len(), TABLE_SIZE);
    }

    #[test]
    fn every_entry_is_its_own_scalar_times_g() {
        let mut rng = StdRng::seed_from_u64(2);
        for entry in build(&range(40), &mut rng) {
            assert_eq!(entry.point, secp::mul_generator(&entry.delta));
        }
    }

    #[test]
    fn deltas_stay_inside_the_sampling_window() {
        let range_size = range(40);
        let mean = range_size.sqrt() >> 1;
        let low = (&mean >> 1) + 1u32;
        let high = &mean + &low;
        let mut rng = StdRng::seed_from_u64(3);
        for entry in build(&range_size, &mut rng) {
            assert!(entry.delta >= low && entry.delta < high);
        }
    }

    #[test]
    fn tiny_range_clamps_oversized_draws() {
        // R = 1: mean clamps to 1 and every draw lands at or above the
        // range, so all deltas collapse to R/2 + 1
        let range_size = BigUint::one();
        let mut rng = StdRng::seed_from_u64(4);
        for entry in build(&range_size, &mut rng) {
            assert_eq!(entry.delta, (&range_size >> 1) + 1u32);
        }
    }

    #[test]
    fn hop_rule_is_deterministic_and_in_bounds() {
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        for last in 0..=255u8 {
            compressed[32] = last;
            let idx = jump_index(&compressed);
            assert!(idx < TABLE_SIZE);
            assert_eq!(idx, jump_index(&compressed.clone()));
            assert_eq!(idx, last as usize % TABLE_SIZE);
        }
    }
}
