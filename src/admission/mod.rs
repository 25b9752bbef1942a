//! Per-request admission decisions.

mod decision;
mod filter;

pub use decision::{Decision, DenyReason};
pub use filter::AdmissionFilter;
