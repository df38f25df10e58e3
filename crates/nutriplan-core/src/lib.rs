//! Core of the nutrition planner: target calculation, budgeted meal
//! generation, validation with retry routing, shopping list consolidation
//! and the suspend/resume workflow that ties them together.

pub mod backend;
pub mod calculation;
pub mod config;
pub mod generation;
pub mod lookup;
pub mod models;
pub mod review;
pub mod shopping;
pub mod validation;
pub mod workflow;

pub use config::PlannerConfig;
pub use review::{ReviewDecision, ReviewPayload};
pub use workflow::{Phase, Planner, Stage, WorkflowError, WorkflowState};
