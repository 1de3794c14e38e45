//! Validation Pipeline (§4.5): the fixed, ordered sequence of stages every
//! draft `TaskSpec` passes through before it can be approved or executed —
//! schema check, policy check, blast-radius calculation, risk scoring, and
//! HITL routing — plus the post-execution verification stage the
//! Execution Coordinator drives once a task's steps have run.
//!
//! # Example
//!
//! ```rust,ignore
//! use orch_validation_pipeline::ValidationPipeline;
//!
//! let report = pipeline.validate(&draft_spec).await?;
//! if report.vetoed {
//!     // surface `ValidationFailed` with report.findings
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod inventory;
mod pipeline;
mod risk;

pub use error::ValidationError;
pub use inventory::{AssetCounts, Inventory, InventoryError, InventorySelector};
pub use pipeline::{ValidationPipeline, ValidationReport};
pub use risk::{band_for, route_hitl, score_risk, HitlRouting};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
