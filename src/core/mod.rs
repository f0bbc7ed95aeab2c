//! Core declaration model: types, graph, parameter registry, deployment
//! config, environment plumbing, and template synthesis.

pub mod config;
pub mod env;
pub mod graph;
pub mod registry;
pub mod synth;
pub mod types;
