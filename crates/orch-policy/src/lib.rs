//! Policy (§4.5 stage 2, §6): tenant-scoped rules such as "no mutate-fleet
//! in production during a freeze window". Each evaluation emits findings
//! and, on a hard violation, a veto.

#![warn(unreachable_pub)]

mod error;
mod evaluator;
mod rule;

pub use error::PolicyError;
pub use evaluator::PolicyEvaluator;
pub use rule::{FreezeWindow, PolicyOutcome, RuleSet};
