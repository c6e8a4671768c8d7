//! Command handlers. Each one turns parsed arguments into calls on the core
//! services and reports the outcome.

pub mod render;
