//! Kangaroo walk core: jump table, walker herds, distinguished-point
//! registry and the solver driver.

pub mod collision;
pub mod jump_table;
pub mod manager;
pub mod stepper;

pub use collision::{DpRecord, DpRegistry, SubmitOutcome};
pub use jump_table::{JumpEntry, TABLE_SIZE};
pub use manager::{KangarooSolver, SolverHandle};
pub use stepper::{Herd, Walker};
