//! Declarative constructs composing the deployable stack.

pub mod database;
pub mod secrets;
pub mod stack;

/// Default stack name; prefixes resource, secret, and parameter names.
pub const DEFAULT_NAME: &str = "purplship";

/// Default application image pulled from the public registry.
pub const DEFAULT_IMAGE: &str = "purplship/purplship-server:latest";

/// Port purplship-server listens on.
pub const DEFAULT_PORT: u16 = 5002;
