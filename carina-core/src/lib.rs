//! Carina Core
//!
//! Provider-facing core of an infrastructure management tool: the resource
//! model, attribute schemas, and the adapter and finder contracts that
//! provider crates implement.

pub mod adapter;
pub mod differ;
pub mod finder;
pub mod provider;
pub mod resource;
pub mod schema;
