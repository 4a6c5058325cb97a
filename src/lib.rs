//! rangeroo - Pollard's kangaroo (lambda) interval ECDLP solver for
//! secp256k1.
//!
//! Finds the private key behind a target public key when the key is known to
//! lie inside an interval `[L, U]` of the scalar field. Two herds of walkers
//! take deterministic pseudo-random jumps through the curve group: tame
//! walkers anchor at a known scalar above the interval, wild walkers at the
//! target itself. Only distinguished points (encodings with a run of
//! trailing zero bits) are recorded, and a tame/wild hit on the same point
//! yields the key as the difference of the two walk distances mod n.
//!
//! The fleet runs either on CPU threads or through a batched back end
//! behind [`gpu::Accelerator`]; long searches are resumable through the
//! plain-text checkpoint in [`checkpoint`].

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod gpu;
pub mod kangaroo;
pub mod math;
pub mod utils;

pub use config::Config;
pub use error::SolverError;
pub use kangaroo::manager::{KangarooSolver, SolverHandle};
