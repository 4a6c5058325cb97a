//! Distinguished-point registry and tame/wild collision resolution.
//!
//! The registry is the only shared mutable structure of a run. It lives
//! behind a single lock owned by the driver; `submit` is the one mutation
//! point and does the candidate-key verification in place, which is fine
//! under the lock because cross-herd hits are rare.

use std::collections::HashMap;

use log::{debug, info};
use num_bigint::BigUint;

use crate::kangaroo::stepper::Herd;
use crate::math::secp;

/// One stored witness per distinguished point.
#[derive(Clone, Debug)]
pub struct DpRecord {
    pub distance: BigUint,
    pub herd: Herd,
}

/// Outcome of publishing a distinguished point.
#[derive(Debug)]
pub enum SubmitOutcome {
    Inserted,
    /// The same herd already holds this point; the earliest witness stays.
    Duplicate,
    /// Cross-herd hit whose candidate key did not reproduce the target.
    FalseCollision,
    Solved(BigUint),
}

/// Mapping from the 33-byte compressed encoding to its witness. Records
/// accumulate monotonically; evicting one would throw progress away.
pub struct DpRegistry {
    records: HashMap<[u8; 33], DpRecord>,
    target_compressed: [u8; 33],
}

impl DpRegistry {
    pub fn new(target_compressed: [u8; 33]) -> Self {
        DpRegistry {
            records: HashMap::new(),
            target_compressed,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&[u8; 33], &DpRecord)> {
        self.records.iter()
    }

    /// Insert a restored record without collision processing (checkpoint
    /// load path).
    pub fn restore(&mut self, key: [u8; 33], record: DpRecord) {
        self.records.insert(key, record);
    }

    /// Publish a distinguished point.
    ///
    /// First witness per key wins within a herd. A cross-herd hit yields the
    /// candidate `k = (d_tame - d_wild) mod n`, which is accepted only if
    /// `k*G` reproduces the target's compressed encoding.
    pub fn submit(&mut self, key: [u8; 33], distance: BigUint, herd: Herd) -> SubmitOutcome {
        if !self.records.contains_key(&key) {
            self.records.insert(key, DpRecord { distance, herd });
            return SubmitOutcome::Inserted;
        }
        let existing = &self.records[&key];

        if existing.herd == herd {
            return SubmitOutcome::Duplicate;
        }

        let (tame_dist, wild_dist) = match herd {
            Herd::Tame => (&distance, &existing.distance),
            Herd::Wild => (&existing.distance, &distance),
        };
        let candidate = recover_key(tame_dist, wild_dist);

        let reproduced = secp::serialize_compressed(&secp::mul_generator(&candidate));
        match reproduced {
            Ok(encoded) if encoded == self.target_compressed => {
                info!("tame/wild collision verified against the target");
                SubmitOutcome::Solved(candidate)
            }
            _ => {
                debug!("cross-herd hit rejected: candidate does not reproduce the target");
                SubmitOutcome::FalseCollision
            }
        }
    }
}

/// `k = (d_tame - d_wild) mod n`.
///
/// Tame satisfies `P = d_T*G` and wild `P = T + d_W*G`; the two walks landed
/// on the same point, so `T = (d_T - d_W)*G`.
pub fn recover_key(tame: &BigUint, wild: &BigUint) -> BigUint {
    let order = &*secp::ORDER;
    if tame >= wild {
        (tame - wild) % order
    } else {
        let deficit = (wild - tame) % order;
        (order - deficit) % order
    }
}
