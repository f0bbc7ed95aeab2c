//! Shipstack — declarative deployment stack for purplship-server.
//!
//! Declares a typed resource graph (network, cluster, secrets, database,
//! container service) and synthesizes it into a BLAKE3-fingerprinted JSON
//! template for the provisioning engine. No provider calls, no secret
//! values: everything here is declaration and validation.

pub mod cli;
pub mod constructs;
pub mod core;
