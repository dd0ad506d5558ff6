//! # ABO Exchange
//!
//! Blood-type feasibility checks for paired kidney-exchange cycles.
//!
//! ## Features
//!
//! - Standard ABO compatibility table (O universal donor, AB universal recipient)
//! - Directed N-pair exchange cycle check with per-edge pass/fail outcomes
//! - Selectable same-pair rule (pairs must be compatible, or must need the exchange)
//! - Exhaustive, multi-threaded search for feasible type assignments
//! - Text, JSON, CSV and HTML (SVG cycle diagram) reports

pub mod config;
pub mod error;
pub mod evaluator;
pub mod output;
pub mod solver;
pub mod types;

// Re-export key types
pub use config::BoardConfig;
pub use error::{ExchangeError, ExchangeResult};
pub use evaluator::{evaluate, FeasibilityEvaluator};
pub use output::{BoardReport, ReportFormat, ReportGenerator};
pub use solver::{AssignmentSolver, ConflictReport, NearMiss, SolveOutcome, TypeDomain};
pub use types::*;
