//! Solver driver: owns the jump table and the registry, seeds and runs the
//! walker fleets, and services stop and checkpoint requests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use k256::ProjectivePoint;
use log::{debug, info, warn};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, ToPrimitive};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::error::SolverError;
use crate::gpu::backend::{Accelerator, MathTest, DP_CAP};
use crate::gpu::cpu_backend::CpuAccelerator;
use crate::gpu::{DIST_LANE, POINT_LANE};
use crate::kangaroo::collision::{DpRecord, DpRegistry, SubmitOutcome};
use crate::kangaroo::jump_table::{self, JumpEntry};
use crate::kangaroo::stepper::{is_distinguished, Herd, Walker};
use crate::math::secp;
use crate::utils::encoding;

struct Clock {
    started: Instant,
    /// Wall time carried over from resumed runs, so rate reporting stays
    /// meaningful across restarts.
    loaded: f64,
}

/// State shared between the driver, its walkers and the outside world
/// (monitor thread, signal handler).
struct Shared {
    total_jumps: AtomicU64,
    should_stop: AtomicBool,
    found: AtomicBool,
    private_key: Mutex<Option<BigUint>>,
    checkpoint_request: Mutex<Option<PathBuf>>,
    clock: Mutex<Clock>,
    /// `2 * sqrt(R)`, the textbook expectation for one tame/wild pair. A
    /// headline figure for the estimator, not a prediction.
    expected_ops: f64,
}

/// Cloneable view of a running solver for monitors and signal handlers.
#[derive(Clone)]
pub struct SolverHandle {
    shared: Arc<Shared>,
}

impl SolverHandle {
    pub fn total_jumps(&self) -> u64 {
        self.shared.total_jumps.load(Ordering::Relaxed)
    }

    /// Wall-clock seconds since the run started plus any resumed duration.
    pub fn duration(&self) -> f64 {
        let clock = self.shared.clock.lock().unwrap();
        clock.started.elapsed().as_secs_f64() + clock.loaded
    }

    pub fn ops_per_second(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.total_jumps() as f64 / duration
    }

    /// `None` until the rate is measurable.
    pub fn estimated_seconds_remaining(&self) -> Option<f64> {
        let rate = self.ops_per_second();
        if rate <= 0.0 {
            return None;
        }
        let remaining = (self.shared.expected_ops - self.total_jumps() as f64).max(0.0);
        Some(remaining / rate)
    }

    pub fn is_found(&self) -> bool {
        self.shared.found.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.should_stop.load(Ordering::Relaxed)
    }

    /// Cooperative stop; walkers observe it at their next DP submission or
    /// 1000-step boundary, the accelerator loop at its next launch boundary.
    pub fn stop(&self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
    }

    /// Ask the driver to write a checkpoint at its next safe point.
    pub fn request_checkpoint(&self, path: PathBuf) {
        *self.shared.checkpoint_request.lock().unwrap() = Some(path);
    }

    pub fn private_key(&self) -> Option<BigUint> {
        self.shared.private_key.lock().unwrap().clone()
    }
}

pub struct KangarooSolver {
    end_range: BigUint,
    range_size: BigUint,
    target: ProjectivePoint,

    num_threads: usize,
    dp_bits: u32,
    manual_dp_bits: bool,

    use_gpu: bool,
    gpu_batch: usize,
    gpu_steps: u32,

    seed: u64,

    jump_table: Vec<JumpEntry>,
    registry: Mutex<DpRegistry>,
    shared: Arc<Shared>,

    loaded_from_checkpoint: bool,
    saved_gpu_points: Vec<u8>,
    saved_gpu_dists: Vec<u8>,
}

impl KangarooSolver {
    pub fn new(config: &Config) -> Result<Self, SolverError> {
        let target = config.parse_target()?;
        let (start_range, end_range) = config.parse_ranges()?;
        let range_size = &end_range - &start_range;
        let target_compressed = secp::serialize_compressed(&target)?;

        let (dp_bits, manual_dp_bits) = match config.dp_bits {
            Some(bits) => (bits, true),
            None => (Self::auto_dp_bits(&range_size), false),
        };

        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let jump_table = jump_table::build(&range_size, &mut rng);

        let sqrt_range = range_size.sqrt().to_f64().unwrap_or(f64::MAX);
        info!("range size: {range_size} (sqrt {sqrt_range:.0})");
        info!("dp bits: {dp_bits} (1 in {})", 1u64 << dp_bits);

        Ok(KangarooSolver {
            end_range,
            range_size,
            target,
            num_threads: config.num_threads(),
            dp_bits,
            manual_dp_bits,
            use_gpu: config.gpu,
            gpu_batch: config.batch,
            gpu_steps: config.steps,
            seed,
            jump_table,
            registry: Mutex::new(DpRegistry::new(target_compressed)),
            shared: Arc::new(Shared {
                total_jumps: AtomicU64::new(0),
                should_stop: AtomicBool::new(false),
                found: AtomicBool::new(false),
                private_key: Mutex::new(None),
                checkpoint_request: Mutex::new(None),
                clock: Mutex::new(Clock {
                    started: Instant::now(),
                    loaded: 0.0,
                }),
                expected_ops: sqrt_range * 2.0,
            }),
            loaded_from_checkpoint: false,
            saved_gpu_points: Vec::new(),
            saved_gpu_dists: Vec::new(),
        })
    }

    /// `clamp(floor(log2(sqrt(R) / 100000)), 1, 24)`: aims for on the order
    /// of 1e5 distinguished points over the expected `2*sqrt(R)` of work.
    fn auto_dp_bits(range_size: &BigUint) -> u32 {
        let sqrt = range_size.sqrt().to_f64().unwrap_or(f64::MAX);
        let avg_steps_per_dp = (sqrt / 100_000.0).max(1.0);
        (avg_steps_per_dp.log2() as u32).clamp(1, 24)
    }

    pub fn handle(&self) -> SolverHandle {
        SolverHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn dp_bits(&self) -> u32 {
        self.dp_bits
    }

    pub fn accelerator_launch(&self) -> (usize, u32) {
        (self.gpu_batch, self.gpu_steps)
    }

    pub fn total_jumps(&self) -> u64 {
        self.shared.total_jumps.load(Ordering::Relaxed)
    }

    pub fn registry_len(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    pub fn is_found(&self) -> bool {
        self.shared.found.load(Ordering::Relaxed)
    }

    pub fn private_key(&self) -> Option<BigUint> {
        self.shared.private_key.lock().unwrap().clone()
    }

    /// Run until the key is found or a stop is requested.
    pub fn run(&mut self) -> Result<(), SolverError> {
        {
            let mut clock = self.shared.clock.lock().unwrap();
            clock.started = Instant::now();
        }
        if self.use_gpu {
            self.run_gpu()
        } else {
            self.run_cpu()
        }
    }

    fn run_cpu(&self) -> Result<(), SolverError> {
        let tame_count = self.num_threads.div_ceil(2).max(1);
        let wild_count = self.num_threads.saturating_sub(tame_count);
        info!("starting {tame_count} tame and {wild_count} wild walkers");

        thread::scope(|scope| {
            for id in 0..self.num_threads {
                let herd = if id < tame_count { Herd::Tame } else { Herd::Wild };
                scope.spawn(move || self.walk(id, herd));
            }

            // service checkpoint requests while the fleet runs
            loop {
                if let Some(path) = self.take_checkpoint_request() {
                    if let Err(err) = self.save_checkpoint(&path) {
                        warn!("checkpoint save failed: {err}");
                    }
                }
                if self.shared.should_stop.load(Ordering::Relaxed) {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });
        Ok(())
    }

    /// One walker's hot loop. Stop-flag checks happen on every DP
    /// publication and every 1000 steps, keeping the flag off the fast path.
    fn walk(&self, id: usize, herd: Herd) {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(id as u64 + 1));
        let offset_bound = (&self.range_size / 100u32) + 1u32;

        let mut walker = match self.seed_walker(herd, &mut rng, &offset_bound) {
            Ok(walker) => walker,
            Err(err) => {
                warn!("walker {id} failed to seed: {err}");
                return;
            }
        };

        let mut local_steps: u64 = 0;
        loop {
            match walker.step(&self.jump_table) {
                Ok(compressed) => {
                    self.shared.total_jumps.fetch_add(1, Ordering::Relaxed);
                    if is_distinguished(compressed, self.dp_bits) {
                        let key = *compressed;
                        let distance = walker.distance.clone();
                        self.publish(key, distance, herd);
                        if self.shared.should_stop.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
                Err(err) => {
                    debug!("walker {id}: {err}; reseeding");
                    match self.seed_walker(herd, &mut rng, &offset_bound) {
                        Ok(fresh) => walker = fresh,
                        Err(err) => {
                            warn!("walker {id} could not reseed: {err}");
                            return;
                        }
                    }
                }
            }
            local_steps += 1;
            if local_steps % 1000 == 0 && self.shared.should_stop.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    fn seed_walker(
        &self,
        herd: Herd,
        rng: &mut StdRng,
        offset_bound: &BigUint,
    ) -> Result<Walker, SolverError> {
        let offset = rng.gen_biguint_below(offset_bound);
        match herd {
            // tame anchors above the range end so it walks ahead of every
            // key the wild herd could represent
            Herd::Tame => Walker::tame(&self.end_range + offset),
            Herd::Wild => Walker::wild(&self.target, offset),
        }
    }

    fn publish(&self, key: [u8; 33], distance: BigUint, herd: Herd) {
        let mut registry = self.registry.lock().unwrap();
        if self.shared.should_stop.load(Ordering::Relaxed) {
            return;
        }
        if let SubmitOutcome::Solved(private_key) = registry.submit(key, distance, herd) {
            *self.shared.private_key.lock().unwrap() = Some(private_key);
            self.shared.found.store(true, Ordering::SeqCst);
            self.shared.should_stop.store(true, Ordering::SeqCst);
        }
    }

    fn run_gpu(&mut self) -> Result<(), SolverError> {
        self.tune_accelerator_parameters();
        info!(
            "accelerator launch: batch={} steps={} dp_bits={}",
            self.gpu_batch, self.gpu_steps, self.dp_bits
        );

        let mut accel = CpuAccelerator::new();
        accel.init(&self.jump_table)?;
        if let Err(err) = self.accelerator_self_test(&mut accel) {
            warn!("{err}; continuing on the untrusted back end");
        }

        let (mut points, mut dists) = self.seed_accelerator_state()?;

        loop {
            if let Some(path) = self.take_checkpoint_request() {
                self.saved_gpu_points = points.clone();
                self.saved_gpu_dists = dists.clone();
                if let Err(err) = self.save_checkpoint(&path) {
                    warn!("checkpoint save failed: {err}");
                }
            }

            let found_dps =
                accel.run_step(&mut points, &mut dists, self.gpu_steps, self.dp_bits)?;
            self.shared
                .total_jumps
                .fetch_add(self.gpu_batch as u64 * self.gpu_steps as u64, Ordering::Relaxed);

            for dp in found_dps {
                let mut sec1 = [0u8; 65];
                sec1[0] = 0x04;
                sec1[1..33].copy_from_slice(&dp.x);
                sec1[33..].copy_from_slice(&dp.y);
                let point = match secp::parse_point(&sec1) {
                    Ok(point) => point,
                    Err(_) => {
                        debug!("accelerator returned an invalid point; dropped");
                        continue;
                    }
                };
                let compressed = match secp::serialize_compressed(&point) {
                    Ok(encoded) => encoded,
                    Err(_) => continue,
                };
                // the back end is untrusted on rarely-hit conditions;
                // re-check the predicate on the host
                if !is_distinguished(&compressed, self.dp_bits) {
                    debug!("accelerator returned a non-distinguished point; dropped");
                    continue;
                }
                let distance = encoding::bytes_to_biguint(&dp.distance);
                self.publish(compressed, distance, Herd::from_slot(dp.slot as usize));
                if self.shared.found.load(Ordering::Relaxed) {
                    break;
                }
            }

            if self.shared.should_stop.load(Ordering::Relaxed) {
                break;
            }
        }

        self.saved_gpu_points = points;
        self.saved_gpu_dists = dists;
        Ok(())
    }

    /// Applied once before the accelerator loop: raise dp_bits on large
    /// ranges to bound registry traffic, then shrink the launch so the
    /// per-launch DP count stays below half the return buffer.
    pub fn tune_accelerator_parameters(&mut self) {
        if !self.manual_dp_bits {
            let expected_ops = self.range_size.sqrt().to_f64().unwrap_or(f64::MAX) * 2.0;
            if expected_ops > (1u64 << 20) as f64 && self.dp_bits < 16 {
                self.dp_bits = 16;
                info!("raising dp_bits to 16 to bound accelerator registry traffic");
            }
        }

        let hit_rate = 1.0 / (1u64 << self.dp_bits) as f64;
        let max_total_steps = (DP_CAP / 2) as f64 / hit_rate;
        if self.gpu_batch as f64 * self.gpu_steps as f64 > max_total_steps {
            let steps = (max_total_steps / self.gpu_batch as f64) as u32;
            if steps >= 1 {
                self.gpu_steps = steps;
            } else {
                self.gpu_steps = 1;
                // keep at least one SIMD-group's worth of slots
                self.gpu_batch = (max_total_steps as usize).max(32);
            }
            info!(
                "clamped accelerator launch to batch={} steps={} for dp_bits={}",
                self.gpu_batch, self.gpu_steps, self.dp_bits
            );
        }
    }

    fn accelerator_self_test(&self, accel: &mut dyn Accelerator) -> Result<(), SolverError> {
        let g = ProjectivePoint::GENERATOR;
        let jump = &self.jump_table[0];

        let a = secp::serialize_uncompressed(&g)?;
        let b = secp::serialize_uncompressed(&jump.point)?;
        let got = accel.run_math_test(MathTest::PointAdd, &a[1..], &b[1..])?;
        let reference = secp::serialize_uncompressed(&(g + jump.point))?;
        if got.as_slice() != &reference[1..] {
            return Err(SolverError::AcceleratorIntegrity(
                "point addition disagrees with the host reference".into(),
            ));
        }

        let a = encoding::biguint_to_bytes32(&(&*secp::ORDER - 1u32));
        let b = encoding::biguint_to_bytes32(&BigUint::from(2u32));
        let got = accel.run_math_test(MathTest::ScalarAddModN, &a, &b)?;
        if encoding::bytes_to_biguint(&got) != BigUint::one() {
            return Err(SolverError::AcceleratorIntegrity(
                "scalar addition mod n disagrees with the host reference".into(),
            ));
        }
        Ok(())
    }

    /// Fresh flat arrays for the accelerator, with any checkpointed slots
    /// overlaid. Even slots are tame, odd slots wild.
    fn seed_accelerator_state(&mut self) -> Result<(Vec<u8>, Vec<u8>), SolverError> {
        let mut points = vec![0u8; self.gpu_batch * POINT_LANE];
        let mut dists = vec![0u8; self.gpu_batch * DIST_LANE];

        let mut rng = StdRng::seed_from_u64(self.seed ^ 0x6a75_6d70);
        for slot in 0..self.gpu_batch {
            let offset = rng.gen_biguint_below(&self.range_size);
            let (distance, point) = match Herd::from_slot(slot) {
                Herd::Tame => {
                    let start = &self.end_range + &offset;
                    let point = secp::mul_generator(&start);
                    (start, point)
                }
                Herd::Wild => {
                    let point = secp::add_scalar(&self.target, &offset);
                    (offset, point)
                }
            };
            let encoded = secp::serialize_uncompressed(&point)?;
            points[slot * POINT_LANE..(slot + 1) * POINT_LANE].copy_from_slice(&encoded[1..]);
            dists[slot * DIST_LANE..(slot + 1) * DIST_LANE]
                .copy_from_slice(&encoding::biguint_to_bytes32(&distance));
        }

        if self.loaded_from_checkpoint
            && (!self.saved_gpu_points.is_empty() || !self.saved_gpu_dists.is_empty())
        {
            let saved_slots = (self.saved_gpu_points.len() / POINT_LANE)
                .min(self.saved_gpu_dists.len() / DIST_LANE);
            let keep = saved_slots.min(self.gpu_batch);
            if saved_slots != self.gpu_batch {
                warn!(
                    "checkpoint holds {saved_slots} accelerator slots but the batch is {}; \
                     keeping {keep} and seeding the rest fresh",
                    self.gpu_batch
                );
            }
            points[..keep * POINT_LANE].copy_from_slice(&self.saved_gpu_points[..keep * POINT_LANE]);
            dists[..keep * DIST_LANE].copy_from_slice(&self.saved_gpu_dists[..keep * DIST_LANE]);
            info!("restored {keep} accelerator slots from the checkpoint");
        }

        Ok((points, dists))
    }

    fn take_checkpoint_request(&self) -> Option<PathBuf> {
        self.shared.checkpoint_request.lock().unwrap().take()
    }

    /// Dump a checkpoint. The registry lock is held across the write so the
    /// record set is a point-in-time view.
    pub fn save_checkpoint(&self, path: &Path) -> Result<(), SolverError> {
        let registry = self.registry.lock().unwrap();
        let records = registry
            .records()
            .map(|(key, record)| (*key, record.distance.clone(), record.herd))
            .collect();
        let checkpoint = Checkpoint {
            total_jumps: self.shared.total_jumps.load(Ordering::Relaxed),
            duration: self.handle().duration(),
            dp_bits: self.dp_bits,
            records,
            gpu_points: self.saved_gpu_points.clone(),
            gpu_dists: self.saved_gpu_dists.clone(),
        };
        checkpoint.save(path)?;
        drop(registry);
        info!("checkpoint saved to {}", path.display());
        Ok(())
    }

    /// Restore a prior run. The file is parsed completely before any live
    /// state changes, so a corrupt checkpoint leaves the solver untouched.
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<(), SolverError> {
        let checkpoint = Checkpoint::load(path)?;

        self.shared
            .total_jumps
            .store(checkpoint.total_jumps, Ordering::Relaxed);
        self.shared.clock.lock().unwrap().loaded = checkpoint.duration;
        if !self.manual_dp_bits && checkpoint.dp_bits != 0 {
            self.dp_bits = checkpoint.dp_bits;
        }

        let restored = checkpoint.records.len();
        {
            let mut registry = self.registry.lock().unwrap();
            for (key, distance, herd) in checkpoint.records {
                registry.restore(key, DpRecord { distance, herd });
            }
        }
        self.saved_gpu_points = checkpoint.gpu_points;
        self.saved_gpu_dists = checkpoint.gpu_dists;
        self.loaded_from_checkpoint = true;

        info!(
            "restored {restored} distinguished points and {} jumps of prior work",
            checkpoint.total_jumps
        );
        Ok(())
    }
}
