//! Checkpoint round-trips through the solver: save, restore, continue.

use clap::Parser;
use num_bigint::BigUint;
use tempfile::TempDir;

use rangeroo::config::Config;
use rangeroo::kangaroo::manager::KangarooSolver;
use rangeroo::math::secp;

fn target_hex(key: u64) -> String {
    let point = secp::mul_generator(&BigUint::from(key));
    hex::encode(secp::serialize_compressed(&point).unwrap())
}

fn solver(args: &[&str]) -> KangarooSolver {
    let config = Config::try_parse_from(args).unwrap();
    KangarooSolver::new(&config).unwrap()
}

#[test]
fn resume_restores_progress_and_still_solves() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.checkpoint");
    let target = target_hex(0x1234);
    let args = [
        "rangeroo", &target, "0x1000", "0x2000", "--threads", "2", "--dp", "4", "--seed", "7",
    ];

    let mut first = solver(&args);
    first.run().unwrap();
    assert!(first.is_found());
    first.save_checkpoint(&path).unwrap();

    let jumps_before = first.total_jumps();
    let dp_count = first.registry_len();
    assert!(dp_count >= 1);

    let mut resumed = solver(&args);
    resumed.load_checkpoint(&path).unwrap();
    assert_eq!(resumed.total_jumps(), jumps_before);
    assert_eq!(resumed.registry_len(), dp_count);
    assert_eq!(resumed.dp_bits(), 4);

    resumed.run().unwrap();
    assert_eq!(resumed.private_key().unwrap(), BigUint::from(0x1234u32));
    // restored work plus the new walk: strictly monotonic
    assert!(resumed.total_jumps() > jumps_before);
}

#[test]
fn checkpointed_dp_bits_only_apply_without_an_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dp.checkpoint");
    let target = target_hex(0x1234);

    let first = solver(&[
        "rangeroo", &target, "0x1000", "0x2000", "--dp", "4", "--seed", "7",
    ]);
    // nothing has run; the checkpoint just carries parameters
    first.save_checkpoint(&path).unwrap();

    // auto-tuned solver adopts the stored value
    let mut auto = solver(&["rangeroo", &target, "0x1000", "0x2000", "--seed", "7"]);
    assert_eq!(auto.dp_bits(), 1);
    auto.load_checkpoint(&path).unwrap();
    assert_eq!(auto.dp_bits(), 4);

    // a manual --dp wins over the stored value
    let mut manual = solver(&[
        "rangeroo", &target, "0x1000", "0x2000", "--dp", "7", "--seed", "7",
    ]);
    manual.load_checkpoint(&path).unwrap();
    assert_eq!(manual.dp_bits(), 7);
}

#[test]
fn corrupt_checkpoints_leave_the_solver_untouched() {
    let dir = TempDir::new().unwrap();
    let target = target_hex(0x1234);

    let bad_tag = dir.path().join("bad_tag.checkpoint");
    std::fs::write(&bad_tag, "V9\nTOTAL_JUMPS 99\n").unwrap();

    let truncated = dir.path().join("truncated.checkpoint");
    std::fs::write(&truncated, "V1\nTOTAL_JUMPS 99\nDISTINGUISHED_POINTS 5\n").unwrap();

    for bad in [bad_tag, truncated] {
        let mut solver = solver(&["rangeroo", &target, "0x1000", "0x2000", "--seed", "7"]);
        assert!(solver.load_checkpoint(&bad).is_err());
        assert_eq!(solver.total_jumps(), 0);
        assert_eq!(solver.registry_len(), 0);
        assert_eq!(solver.dp_bits(), 1);
    }
}
