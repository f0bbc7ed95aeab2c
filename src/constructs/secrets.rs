//! SecretBundle — the three generated credential secrets for
//! purplship-server, with their locators published for later lookup.
//!
//! The db secret assumes a postgres database and seeds `username` with
//! "postgres". Admin and db secrets exclude punctuation from the generated
//! value: special characters break the downstream container bootstrap.

use crate::core::graph::ResourceGraph;
use crate::core::types::{GenerationRule, ResourceSpec, SecretSpec, Value};
use indexmap::IndexMap;

/// Handle to one declared secret.
#[derive(Debug, Clone)]
pub struct SecretHandle {
    /// Resource id within the graph
    pub id: String,

    /// Provider-visible secret name
    pub secret_name: String,
}

impl SecretHandle {
    /// Deferred reference to the secret's provider-assigned locator.
    pub fn locator(&self) -> Value {
        Value::attr(&self.id, "locator")
    }
}

/// Inputs for the secret bundle.
#[derive(Debug, Clone)]
pub struct SecretBundleProps {
    /// Name prefix for secrets and published parameters
    pub base_name: String,

    /// Administrator email seeded into the admin secret
    pub admin_email: String,
}

impl SecretBundleProps {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            base_name: super::DEFAULT_NAME.to_string(),
            admin_email: admin_email.into(),
        }
    }
}

/// The declared admin, db, and app secrets.
#[derive(Debug, Clone)]
pub struct SecretBundle {
    pub admin: SecretHandle,
    pub db: SecretHandle,
    pub app: SecretHandle,
}

impl SecretBundle {
    /// Declare the three secrets, publish each locator under
    /// `<base>-<kind>-secret-arn`, and declare matching outputs.
    pub fn declare(graph: &mut ResourceGraph, props: &SecretBundleProps) -> Result<Self, String> {
        let base = &props.base_name;

        let mut admin_seed = IndexMap::new();
        admin_seed.insert("email".to_string(), props.admin_email.clone());
        let admin = declare_secret(
            graph,
            "secrets/admin",
            format!("{}/admin", base),
            admin_seed,
            "password",
            GenerationRule {
                exclude_punctuation: true,
                include_space: false,
            },
        )?;

        let mut db_seed = IndexMap::new();
        db_seed.insert("username".to_string(), "postgres".to_string());
        let db = declare_secret(
            graph,
            "secrets/db",
            format!("{}/db", base),
            db_seed,
            "password",
            GenerationRule {
                exclude_punctuation: true,
                include_space: false,
            },
        )?;

        let app = declare_secret(
            graph,
            "secrets/app",
            format!("{}/app", base),
            IndexMap::new(),
            "key",
            GenerationRule {
                exclude_punctuation: false,
                include_space: false,
            },
        )?;

        graph.publish(format!("{}-admin-secret-arn", base), admin.locator())?;
        graph.publish(format!("{}-db-secret-arn", base), db.locator())?;
        graph.publish(format!("{}-app-secret-arn", base), app.locator())?;

        graph.output("AdminSecretArn", admin.locator());
        graph.output("AppSecretArn", app.locator());
        graph.output("DatabaseSecretArn", db.locator());

        Ok(Self { admin, db, app })
    }
}

fn declare_secret(
    graph: &mut ResourceGraph,
    id: &str,
    secret_name: String,
    seed: IndexMap<String, String>,
    generate_field: &str,
    rule: GenerationRule,
) -> Result<SecretHandle, String> {
    graph.declare(
        id,
        ResourceSpec::Secret(SecretSpec {
            secret_name: secret_name.clone(),
            seed,
            generate_field: generate_field.to_string(),
            rule,
        }),
        &[],
    )?;
    Ok(SecretHandle {
        id: id.to_string(),
        secret_name,
    })
}
