//! Batched accelerator back ends.

pub mod backend;
pub mod cpu_backend;

pub use backend::{Accelerator, FoundDp, MathTest, DIST_LANE, DP_CAP, POINT_LANE};
pub use cpu_backend::CpuAccelerator;
