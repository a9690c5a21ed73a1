//! Small helpers shared across the broker analyzer workspace.

pub mod env;
