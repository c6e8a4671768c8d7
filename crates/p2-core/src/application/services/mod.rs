//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "render one template" or "render a batch".

pub mod batch_service;
pub mod template_engine;

pub use batch_service::{BatchFailure, BatchReport, BatchService};
pub use template_engine::TemplateEngine;
