//! # edgeplan
//!
//! Planning and execution engine for the lifecycle of edge host components.
//!
//! This crate provides:
//! - The manifest, state and request model
//! - Dependency resolution with managed/external policies and cycle detection
//! - Ordered plans of install, uninstall and validation steps
//! - A plan runner with an append-only journal and rollback of reversible steps
//! - An [`Engine`] mapping every outcome onto a stable [`ExitCode`]
//!
//! Talking to the outside world (HTTP, the filesystem store, service
//! managers) goes through the traits in [`backend`]; the `hostkit` crate
//! provides the concrete implementations.
//!
//! ## Example
//!
//! ```
//! use edgeplan::plan::sorter::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("gateway");
//! graph.add_node("redis");
//! graph.add_edge("gateway", "redis");
//!
//! let order = graph.topological_order().unwrap();
//! assert_eq!(order, vec!["redis", "gateway"]);
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning                                  |
//! |------|------------------------------------------|
//! | 0    | Success                                  |
//! | 10   | Invalid input                            |
//! | 20   | API or authentication failure            |
//! | 30   | Manifest or artifact failure             |
//! | 40   | Dependency validation failure            |
//! | 50   | Execution failed, rollback succeeded     |
//! | 51   | Execution failed, rollback failed        |
//! | 99   | Unexpected failure                       |

pub mod backend;
pub mod cancel;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ids;
pub mod plan;
pub mod steps;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use engine::{Engine, ExecutionReport, WizardExecutionResult};
pub use error::{Error, ErrorCategory, ExitCode, Result};
pub use plan::{
    ExecutionPlan, PlanBuilder, PlanExecutionResult, PlanRunner, PlannedStep, Planner, RunContext,
    Runner,
};
