//! # repopin
//!
//! Service that keeps a chosen set of repositories at the top of a git
//! hosting provider's "recently updated" listing. A sync run appends
//! synthetic commits to bump branch timestamps, then rewrites recent
//! history to excise those commits while preserving every real commit.

pub mod audit;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod hosting;
pub mod models;
pub mod rate_limit;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
