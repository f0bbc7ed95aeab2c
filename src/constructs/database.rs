//! ManagedDatabaseInstance — a managed postgres instance for
//! purplship-server.
//!
//! The defaults applied here are suitable for **non-production**
//! demonstration and evaluation only: single-AZ on a db.t3.micro class.
//! Production callers must override `instance_class`, `multi_az`, and
//! `engine_version` explicitly; nothing in this construct enforces that.

use super::secrets::SecretHandle;
use crate::core::graph::ResourceGraph;
use crate::core::types::{DatabaseSpec, GenerationRule, ResourceSpec, SecretSpec, Value};
use indexmap::IndexMap;

/// Fixed postgres listener port.
pub const DATABASE_PORT: u16 = 5432;

/// Handle to the declared database instance.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    /// Resource id within the graph
    pub id: String,

    /// Declared listener port
    pub port: u16,
}

impl DatabaseHandle {
    /// Deferred reference to the instance's endpoint host, resolved by the
    /// engine after provisioning.
    pub fn endpoint_address(&self) -> Value {
        Value::attr(&self.id, "endpoint_address")
    }

    /// Deferred reference to the instance's endpoint port.
    pub fn endpoint_port(&self) -> Value {
        Value::attr(&self.id, "endpoint_port")
    }
}

/// Inputs for the database instance, resolved once at declaration time.
#[derive(Debug, Clone)]
pub struct DatabaseProps {
    /// Name prefix for the published credential parameter
    pub base_name: String,

    /// Id of the network declaration hosting the instance
    pub network: String,

    /// Credential secret carrying `username` and `password`; generated
    /// internally (username "postgres") when absent
    pub credentials: Option<SecretHandle>,

    /// Initial database name (default "purplship")
    pub database_name: String,

    /// Instance identifier (default "purplship")
    pub instance_identifier: String,

    /// Instance class (default "db.t3.micro", evaluation-grade)
    pub instance_class: String,

    /// Engine version (default "13.2")
    pub engine_version: String,

    /// Multi-AZ placement (default false: single-AZ)
    pub multi_az: bool,
}

impl DatabaseProps {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            base_name: super::DEFAULT_NAME.to_string(),
            network: network.into(),
            credentials: None,
            database_name: super::DEFAULT_NAME.to_string(),
            instance_identifier: super::DEFAULT_NAME.to_string(),
            instance_class: "db.t3.micro".to_string(),
            engine_version: "13.2".to_string(),
            multi_az: false,
        }
    }
}

/// The declared database instance and the credential secret it consumes.
#[derive(Debug, Clone)]
pub struct ManagedDatabaseInstance {
    pub handle: DatabaseHandle,
    pub credentials: SecretHandle,
}

impl ManagedDatabaseInstance {
    /// Declare the instance under `id`. A supplied credential secret must
    /// already carry `username` and `password`; that is checked here, at
    /// declaration time, not at deploy time.
    pub fn declare(
        graph: &mut ResourceGraph,
        id: &str,
        props: DatabaseProps,
    ) -> Result<Self, String> {
        let credentials = match props.credentials {
            Some(handle) => {
                check_credential_fields(graph, &handle)?;
                handle
            }
            None => generate_credentials(graph, id, &props.base_name)?,
        };

        graph.declare(
            id,
            ResourceSpec::DatabaseInstance(DatabaseSpec {
                engine: "postgres".to_string(),
                version: props.engine_version,
                instance_class: props.instance_class,
                database_name: props.database_name,
                instance_identifier: props.instance_identifier,
                port: DATABASE_PORT,
                multi_az: props.multi_az,
                network: props.network.clone(),
                credentials: credentials.id.clone(),
            }),
            &[props.network.as_str(), credentials.id.as_str()],
        )?;

        graph.publish(
            format!("{}-database-credentials-arn", props.base_name),
            credentials.locator(),
        )?;

        Ok(Self {
            handle: DatabaseHandle {
                id: id.to_string(),
                port: DATABASE_PORT,
            },
            credentials,
        })
    }
}

fn check_credential_fields(graph: &ResourceGraph, handle: &SecretHandle) -> Result<(), String> {
    let decl = graph
        .get(&handle.id)
        .ok_or_else(|| format!("credential secret '{}' is not declared", handle.id))?;
    let secret = match &decl.spec {
        ResourceSpec::Secret(secret) => secret,
        other => {
            return Err(format!(
                "credential resource '{}' is a {}, not a secret",
                handle.id,
                other.kind()
            ))
        }
    };
    for field in ["username", "password"] {
        if !secret.has_field(field) {
            return Err(format!(
                "credential secret '{}' lacks required field '{}'",
                handle.id, field
            ));
        }
    }
    Ok(())
}

fn generate_credentials(
    graph: &mut ResourceGraph,
    id: &str,
    base_name: &str,
) -> Result<SecretHandle, String> {
    let secret_id = format!("{}/credentials", id);
    let secret_name = format!("{}/db", base_name);
    let mut seed = IndexMap::new();
    seed.insert("username".to_string(), "postgres".to_string());
    graph.declare(
        secret_id.as_str(),
        ResourceSpec::Secret(SecretSpec {
            secret_name: secret_name.clone(),
            seed,
            generate_field: "password".to_string(),
            rule: GenerationRule {
                exclude_punctuation: true,
                include_space: false,
            },
        }),
        &[],
    )?;
    Ok(SecretHandle {
        id: secret_id,
        secret_name,
    })
}
