//! Blackboard shared between the coordinator and algorithm units

pub mod history;
pub mod keys;
pub mod store;

pub use store::{Context, ContextEntry, ContextEvent, LastRun};
