//! hwcloud core
//!
//! Resource model, schema, HCL parser, differ and the engine that drives a
//! cloud provider from declarative configuration

pub mod differ;
pub mod effect;
pub mod engine;
pub mod flatmap;
pub mod graph;
pub mod interpreter;
pub mod parser;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
