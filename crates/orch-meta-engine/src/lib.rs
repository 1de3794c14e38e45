//! Meta-Engine (§4.7): classifies operator intent into capability tags,
//! composes a candidate plan by asking the selected agent chain what it
//! would do, drafts and persists the resulting `TaskSpec`, runs it
//! through the Validation Pipeline, and routes it to either auto-approval
//! or human review.

#![warn(unreachable_pub)]

mod approvals;
mod classify;
mod compose;
mod engine;
mod error;
mod identity;

pub use engine::MetaEngine;
pub use error::MetaEngineError;
pub use identity::{Identity, IdentityError, PrincipalInfo, Role};
