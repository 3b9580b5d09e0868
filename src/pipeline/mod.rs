//! Reconciler phases.
//!
//! - `run_validate`: Check descriptors without touching the platform
//! - `refresh`: Reconcile recorded state with the platform
//! - `build_plan`: Diff desired descriptors against refreshed state
//! - `run_apply`: Execute the plan and confirm the result
//! - `run_destroy`: Tear down recorded resources

pub mod apply;
pub mod destroy;
pub mod plan;
pub mod refresh;
pub mod validate;

pub use apply::{ApplyReport, PreparedApply, confirm, execute, prepare, run_apply};
pub use destroy::{DestroyReport, run_destroy};
pub use plan::{Action, FieldChange, Plan, ResourceChange, build_plan};
pub use refresh::refresh;
pub use validate::{ValidationReport, run_validate};
