//! Tollgate - License-Aware Admission Control Gateway
//!
//! This crate implements the admission-control layer that fronts backend
//! APIs: every inbound request is checked against the client's license
//! state, its endpoint allow/block rules, and multi-window rate limits
//! before it is let through. Bucket state lives in a shared store (Redis
//! in production, in-memory for tests) coordinated through optimistic
//! compare-and-swap, so multiple gateway instances share one quota.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod license;
pub mod pattern;
pub mod ratelimit;
