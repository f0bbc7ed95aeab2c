//! Declaration types for the shipstack resource graph.
//!
//! Every type here is a *description* handed to an external provisioning
//! engine, never a live resource. All types derive Serialize/Deserialize so
//! the synthesized template can roundtrip through JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Values and references
// ============================================================================

/// A template value: either a literal string or a deferred reference to an
/// attribute of another declared resource. Attribute references are resolved
/// by the provisioning engine at deploy time — never by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Literal(String),
    Attr { resource: String, attr: String },
}

impl Value {
    /// A literal string value.
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// A deferred attribute reference (`resource.attr`).
    pub fn attr(resource: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::Attr {
            resource: resource.into(),
            attr: attr.into(),
        }
    }

    /// The referenced resource id, if this is an attribute reference.
    pub fn referenced_resource(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Attr { resource, .. } => Some(resource),
        }
    }
}

/// A secret-backed environment entry: (secret, field), resolved by the
/// engine at container start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBinding {
    /// Id of the declared secret resource
    pub secret: String,

    /// JSON field within the secret value
    pub field: String,
}

impl SecretBinding {
    pub fn new(secret: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            field: field.into(),
        }
    }
}

// ============================================================================
// Resource specs
// ============================================================================

/// A single resource declaration, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceSpec {
    Network(NetworkSpec),
    Cluster(ClusterSpec),
    Secret(SecretSpec),
    DatabaseInstance(DatabaseSpec),
    ContainerService(ContainerServiceSpec),
    LogGroup(LogGroupSpec),
    AccessRule(AccessRuleSpec),
}

impl ResourceSpec {
    /// The kind tag, as rendered in templates and messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Cluster(_) => "cluster",
            Self::Secret(_) => "secret",
            Self::DatabaseInstance(_) => "database_instance",
            Self::ContainerService(_) => "container_service",
            Self::LogGroup(_) => "log_group",
            Self::AccessRule(_) => "access_rule",
        }
    }
}

/// A resource declaration plus its explicit ordering edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    /// The resource description
    #[serde(flatten)]
    pub spec: ResourceSpec,

    /// Resource ids that must be provisioned first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

// ============================================================================
// Network
// ============================================================================

/// Subnet placement tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    Public,
    Private,
    Isolated,
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}

/// One subnet tier within a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// Subnet group name
    pub name: String,

    /// CIDR mask width for each subnet in the group
    pub cidr_mask: u8,

    /// Placement tier
    pub tier: SubnetTier,
}

/// A virtual private network with three subnet tiers and a shared outbound
/// gateway. Invariant: `nat_gateway_subnet` must name a public tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Address range, e.g. "10.0.0.0/16"
    pub cidr: String,

    /// Number of availability zones to spread subnets across
    pub max_azs: u8,

    /// Subnet tiers
    pub subnets: Vec<SubnetSpec>,

    /// Number of shared outbound gateways
    pub nat_gateways: u8,

    /// Subnet group name hosting the outbound gateway(s)
    pub nat_gateway_subnet: String,
}

// ============================================================================
// Cluster
// ============================================================================

/// A logical grouping of container compute capacity, bound to one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name
    pub cluster_name: String,

    /// Id of the owning network declaration
    pub network: String,

    /// Enable per-container telemetry collection
    pub container_insights: bool,
}

// ============================================================================
// Secret
// ============================================================================

/// Generation rule for a secret's generated field.
///
/// The engine generates the value at deploy time; the rule pins down the
/// alphabet it may draw from. `charset` exposes that alphabet so the
/// no-punctuation contract is checkable without reading any secret value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRule {
    /// Exclude ASCII punctuation (special characters break the downstream
    /// container bootstrap; reported upstream)
    #[serde(default)]
    pub exclude_punctuation: bool,

    /// Allow the space character
    #[serde(default)]
    pub include_space: bool,
}

impl GenerationRule {
    /// The alphabet the engine may draw generated characters from.
    pub fn charset(&self) -> String {
        let mut chars = String::new();
        chars.extend('A'..='Z');
        chars.extend('a'..='z');
        chars.extend('0'..='9');
        if !self.exclude_punctuation {
            chars.extend("!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~".chars());
        }
        if self.include_space {
            chars.push(' ');
        }
        chars
    }
}

/// A named, generated credential bundle. Seed fields are fixed values; the
/// `generate_field` entry is produced by the engine under `rule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSpec {
    /// Provider-visible secret name, e.g. "purplship/admin"
    pub secret_name: String,

    /// Fixed seed fields, e.g. {"username": "postgres"}
    #[serde(default)]
    pub seed: IndexMap<String, String>,

    /// Field generated by the engine
    pub generate_field: String,

    /// Generation alphabet constraints
    #[serde(default)]
    pub rule: GenerationRule,
}

impl SecretSpec {
    /// Whether the secret's resolved value will carry the given field,
    /// either seeded or generated.
    pub fn has_field(&self, field: &str) -> bool {
        self.generate_field == field || self.seed.contains_key(field)
    }
}

// ============================================================================
// Database
// ============================================================================

/// A managed relational database instance bound to one network and one
/// credential secret.
///
/// The defaults declared by the constructs in this crate (single-AZ,
/// db.t3.micro) are suitable for evaluation only; production callers must
/// override them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSpec {
    /// Database engine
    pub engine: String,

    /// Engine version
    pub version: String,

    /// Instance class
    pub instance_class: String,

    /// Initial database name
    pub database_name: String,

    /// Instance identifier
    pub instance_identifier: String,

    /// Listener port
    pub port: u16,

    /// Multi-AZ placement
    pub multi_az: bool,

    /// Id of the owning network declaration
    pub network: String,

    /// Id of the secret carrying `username` and `password`
    pub credentials: String,
}

// ============================================================================
// Container service
// ============================================================================

/// Where the service's container image comes from. Both deployment profiles
/// are preserved: pulling a public registry reference, or reusing an image
/// already pushed to a provider-hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageSource {
    /// Pull from a public registry, e.g. "purplship/purplship-server:latest"
    Registry { image: String },

    /// Reuse a pre-built image from a provider-hosted repository
    PrebuiltRepository { repository: String, tag: String },
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { image } => write!(f, "{}", image),
            Self::PrebuiltRepository { repository, tag } => {
                write!(f, "{}:{}", repository, tag)
            }
        }
    }
}

/// Load balancer health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Request path. The trailing separator matters: the deployed
    /// application's routing only answers 200 on "/login/".
    pub path: String,

    /// HTTP status range treated as healthy
    pub healthy_http_codes: String,
}

/// A load-balanced container service bound to one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerServiceSpec {
    /// Service name
    pub service_name: String,

    /// Container name within the task
    pub container_name: String,

    /// Id of the owning cluster declaration
    pub cluster: String,

    /// Container image source
    pub image: ImageSource,

    /// Container listening port
    pub container_port: u16,

    /// Desired replica count
    pub desired_count: u32,

    /// Task memory limit (MiB)
    pub memory_limit_mib: u32,

    /// Task CPU units
    pub cpu: u32,

    /// Whether the load balancer is internet-facing
    pub public_facing: bool,

    /// Plain environment variables (literals and deferred references)
    pub environment: IndexMap<String, Value>,

    /// Secret-backed environment variables
    pub secrets: IndexMap<String, SecretBinding>,

    /// Id of the log group declaration
    pub log_group: String,

    /// Load balancer health check
    pub health_check: HealthCheck,
}

// ============================================================================
// Log group
// ============================================================================

/// Disposition of a resource when the stack is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

/// A log group receiving the container's stdout/stderr stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogGroupSpec {
    /// Log group name
    pub log_group_name: String,

    /// Stream name prefix
    pub stream_prefix: String,

    /// Retention in days
    pub retention_days: u32,

    /// What happens to stored logs on stack teardown
    pub removal_policy: RemovalPolicy,
}

// ============================================================================
// Access rule
// ============================================================================

/// Inbound reachability from a container service to a database's listener
/// port. Declared after both endpoints exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRuleSpec {
    /// Id of the connecting container service
    pub from_service: String,

    /// Id of the target database instance
    pub to_database: String,

    /// Target port (the database's declared listener port)
    pub port: u16,

    /// Transport protocol
    pub protocol: String,
}

// ============================================================================
// Tests
// ============================================================================
