//! Reference accelerator: the batched step contract executed slot by slot
//! on the host. Doubles as the parity baseline for kernel back ends and as
//! the back end of `--gpu` builds without a device.

use log::debug;

use crate::error::SolverError;
use crate::gpu::backend::{Accelerator, FoundDp, MathTest, DIST_LANE, DP_CAP, POINT_LANE};
use crate::kangaroo::jump_table::{jump_index, JumpEntry};
use crate::kangaroo::stepper::is_distinguished;
use crate::math::secp;
use crate::utils::encoding;

pub struct CpuAccelerator {
    table: Vec<JumpEntry>,
}

impl CpuAccelerator {
    pub fn new() -> Self {
        CpuAccelerator { table: Vec::new() }
    }
}

impl Default for CpuAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accelerator for CpuAccelerator {
    fn init(&mut self, table: &[JumpEntry]) -> Result<(), SolverError> {
        if table.is_empty() {
            return Err(SolverError::InvalidInput("empty jump table".into()));
        }
        self.table = table.to_vec();
        Ok(())
    }

    fn run_step(
        &mut self,
        points: &mut [u8],
        distances: &mut [u8],
        steps: u32,
        dp_bits: u32,
    ) -> Result<Vec<FoundDp>, SolverError> {
        if self.table.is_empty() {
            return Err(SolverError::AcceleratorIntegrity(
                "run_step called before init".into(),
            ));
        }
        let slots = points.len() / POINT_LANE;
        if distances.len() / DIST_LANE != slots {
            return Err(SolverError::InvalidInput(
                "points and distances arrays describe different slot counts".into(),
            ));
        }

        let order = &*secp::ORDER;
        let mut found = Vec::new();

        for slot in 0..slots {
            let point_lane = &mut points[slot * POINT_LANE..(slot + 1) * POINT_LANE];
            let dist_lane = &mut distances[slot * DIST_LANE..(slot + 1) * DIST_LANE];

            let mut sec1 = [0u8; 65];
            sec1[0] = 0x04;
            sec1[1..].copy_from_slice(point_lane);
            let mut point = match secp::parse_point(&sec1) {
                Ok(point) => point,
                Err(_) => {
                    debug!("slot {slot} holds an invalid point; left untouched");
                    continue;
                }
            };
            let mut distance = encoding::bytes_to_biguint(dist_lane);
            let mut compressed = secp::serialize_compressed(&point)?;
            let mut hit: Option<FoundDp> = None;

            for _ in 0..steps {
                let entry = &self.table[jump_index(&compressed)];
                point += entry.point;
                distance = (distance + &entry.delta) % order;
                compressed = match secp::serialize_compressed(&point) {
                    Ok(encoded) => encoded,
                    Err(_) => {
                        debug!("slot {slot} walked into the identity; parked for this launch");
                        break;
                    }
                };
                if hit.is_none() && is_distinguished(&compressed, dp_bits) {
                    let encoded = secp::serialize_uncompressed(&point)?;
                    let mut x = [0u8; 32];
                    let mut y = [0u8; 32];
                    x.copy_from_slice(&encoded[1..33]);
                    y.copy_from_slice(&encoded[33..65]);
                    hit = Some(FoundDp {
                        slot: slot as u32,
                        x,
                        y,
                        distance: encoding::biguint_to_bytes32(&distance),
                    });
                }
            }

            match secp::serialize_uncompressed(&point) {
                Ok(encoded) => {
                    point_lane.copy_from_slice(&encoded[1..]);
                    dist_lane.copy_from_slice(&encoding::biguint_to_bytes32(&distance));
                }
                Err(_) => debug!("slot {slot} parked on the identity; state not written back"),
            }

            if let Some(dp) = hit {
                if found.len() < DP_CAP {
                    found.push(dp);
                }
            }
        }

        Ok(found)
    }

    fn run_math_test(&mut self, op: MathTest, a: &[u8], b: &[u8]) -> Result<Vec<u8>, SolverError> {
        match op {
            MathTest::PointAdd => {
                let left = parse_xy(a)?;
                let right = parse_xy(b)?;
                let sum = secp::serialize_uncompressed(&(left + right))?;
                Ok(sum[1..].to_vec())
            }
            MathTest::PointMul => {
                let point = parse_xy(a)?;
                let scalar = secp::scalar_from_biguint(&encoding::bytes_to_biguint(b));
                let product = secp::serialize_uncompressed(&(point * scalar))?;
                Ok(product[1..].to_vec())
            }
            MathTest::ModInverse => {
                let scalar = secp::scalar_from_biguint(&encoding::bytes_to_biguint(a));
                let inverse = Option::<k256::Scalar>::from(scalar.invert()).ok_or_else(|| {
                    SolverError::AcceleratorIntegrity("inverse of zero requested".into())
                })?;
                Ok(inverse.to_bytes().to_vec())
            }
            MathTest::ScalarAddModN => {
                let sum = (encoding::bytes_to_biguint(a) + encoding::bytes_to_biguint(b))
                    % &*secp::ORDER;
                Ok(encoding::biguint_to_bytes32(&sum).to_vec())
            }
        }
    }
}

fn parse_xy(bytes: &[u8]) -> Result<k256::ProjectivePoint, SolverError> {
    if bytes.len() != POINT_LANE {
        return Err(SolverError::InvalidInput(
            "point operand must be 64 bytes (X || Y)".into(),
        ));
    }
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(bytes);
    secp::parse_point(&sec1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kangaroo::jump_table;
    use crate::kangaroo::stepper::Walker;
    use num_bigint::BigUint;
    use num_traits::One;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_table(seed: u64) -> Vec<JumpEntry> {
        let mut rng = StdRng::seed_from_u64(seed);
        jump_table::build(&(BigUint::one() << 24), &mut rng)
    }

    fn load_slot(points: &mut [u8], distances: &mut [u8], slot: usize, walker: &Walker) {
        let encoded = secp::serialize_uncompressed(&walker.point).unwrap();
        points[slot * POINT_LANE..(slot + 1) * POINT_LANE].copy_from_slice(&encoded[1..]);
        distances[slot * DIST_LANE..(slot + 1) * DIST_LANE]
            .copy_from_slice(&encoding::biguint_to_bytes32(&walker.distance));
    }

    #[test]
    fn run_step_before_init_is_refused() {
        let mut accel = CpuAccelerator::new();
        let mut points = vec![0u8; POINT_LANE];
        let mut dists = vec![0u8; DIST_LANE];
        assert!(accel.run_step(&mut points, &mut dists, 1, 4).is_err());
    }

    #[test]
    fn single_step_matches_the_cpu_walker_bit_for_bit() {
        let table = seeded_table(21);
        let mut accel = CpuAccelerator::new();
        accel.init(&table).unwrap();

        let mut walker = Walker::tame(BigUint::from(0x2000u32)).unwrap();
        let mut points = vec![0u8; POINT_LANE];
        let mut dists = vec![0u8; DIST_LANE];
        load_slot(&mut points, &mut dists, 0, &walker);

        accel.run_step(&mut points, &mut dists, 1, 24).unwrap();
        walker.step(&table).unwrap();

        let expected = secp::serialize_uncompressed(&walker.point).unwrap();
        assert_eq!(&points[..], &expected[1..]);
        assert_eq!(
            encoding::bytes_to_biguint(&dists),
            walker.distance.clone() % &*secp::ORDER
        );
    }

    #[test]
    fn multi_step_stays_in_lockstep_with_the_walker() {
        let table = seeded_table(22);
        let mut accel = CpuAccelerator::new();
        accel.init(&table).unwrap();

        let target = secp::mul_generator(&BigUint::from(77u32));
        let mut walker = Walker::wild(&target, BigUint::from(5u32)).unwrap();
        let mut points = vec![0u8; POINT_LANE];
        let mut dists = vec![0u8; DIST_LANE];
        load_slot(&mut points, &mut dists, 0, &walker);

        accel.run_step(&mut points, &mut dists, 10, 24).unwrap();
        for _ in 0..10 {
            walker.step(&table).unwrap();
        }

        let expected = secp::serialize_uncompressed(&walker.point).unwrap();
        assert_eq!(&points[..], &expected[1..]);
    }

    #[test]
    fn reports_the_first_distinguished_hit_of_a_slot() {
        let table = seeded_table(23);
        let mut accel = CpuAccelerator::new();
        accel.init(&table).unwrap();

        let mut walker = Walker::tame(BigUint::from(0x3000u32)).unwrap();
        let mut points = vec![0u8; POINT_LANE];
        let mut dists = vec![0u8; DIST_LANE];
        load_slot(&mut points, &mut dists, 0, &walker);

        // dp_bits = 1 hits roughly every other step; 64 steps all but
        // guarantee at least one
        let found = accel.run_step(&mut points, &mut dists, 64, 1).unwrap();
        assert!(found.len() <= 1, "at most one report per slot");

        // replay on the walker and compare against its first DP
        let mut first: Option<(Vec<u8>, BigUint)> = None;
        for _ in 0..64 {
            let compressed = *walker.step(&table).unwrap();
            if first.is_none() && is_distinguished(&compressed, 1) {
                let encoded = secp::serialize_uncompressed(&walker.point).unwrap();
                first = Some((encoded[1..].to_vec(), walker.distance.clone()));
            }
        }

        match (found.first(), first) {
            (Some(dp), Some((xy, distance))) => {
                assert_eq!(dp.slot, 0);
                assert_eq!(&dp.x[..], &xy[..32]);
                assert_eq!(&dp.y[..], &xy[32..]);
                assert_eq!(
                    encoding::bytes_to_biguint(&dp.distance),
                    distance % &*secp::ORDER
                );
            }
            (None, None) => {}
            (got, want) => panic!("accelerator and walker disagree: {got:?} vs {want:?}"),
        }
    }

    #[test]
    fn math_test_point_add_matches_group_law() {
        let mut accel = CpuAccelerator::new();
        let g = k256::ProjectivePoint::GENERATOR;
        let two_g = g + g;
        let a = secp::serialize_uncompressed(&g).unwrap();
        let b = secp::serialize_uncompressed(&two_g).unwrap();
        let got = accel
            .run_math_test(MathTest::PointAdd, &a[1..], &b[1..])
            .unwrap();
        let expected = secp::serialize_uncompressed(&(g + two_g)).unwrap();
        assert_eq!(got, expected[1..].to_vec());
    }

    #[test]
    fn math_test_scalar_add_wraps_mod_n() {
        let mut accel = CpuAccelerator::new();
        let a = encoding::biguint_to_bytes32(&(&*secp::ORDER - 1u32));
        let b = encoding::biguint_to_bytes32(&BigUint::from(3u32));
        let got = accel
            .run_math_test(MathTest::ScalarAddModN, &a, &b)
            .unwrap();
        assert_eq!(encoding::bytes_to_biguint(&got), BigUint::from(2u32));
    }

    #[test]
    fn math_test_inverse_round_trips() {
        let mut accel = CpuAccelerator::new();
        let a = encoding::biguint_to_bytes32(&BigUint::from(12345u32));
        let inv = accel
            .run_math_test(MathTest::ModInverse, &a, &[])
            .unwrap();
        let product = encoding::bytes_to_biguint(&a) * encoding::bytes_to_biguint(&inv);
        assert!((product % &*secp::ORDER).is_one());
    }
}
