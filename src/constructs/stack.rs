//! DeploymentStack — the composition root.
//!
//! Declares (or reuses) a network, then a cluster, the secret bundle, the
//! managed database, a load-balanced container service, and finally the
//! access rule from the service to the database. The declaration order is a
//! contract: the service's environment embeds database endpoint references,
//! and the access rule needs the database's assigned port, so both can only
//! be declared once their targets exist in the graph.

use super::database::{DatabaseProps, ManagedDatabaseInstance};
use super::secrets::{SecretBundle, SecretBundleProps};
use crate::core::config::{AppEnvConfig, ConfigProfile, DatabaseConfig, StackConfig};
use crate::core::env::python_bool_str;
use crate::core::graph::ResourceGraph;
use crate::core::types::*;
use indexmap::IndexMap;

/// Which image the container service runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentProfile {
    /// Pull from a public registry
    PublicRegistry { image: String },

    /// Reuse an image already pushed to a provider-hosted repository
    PrebuiltImage { repository: String, tag: String },
}

impl DeploymentProfile {
    fn image_source(&self) -> ImageSource {
        match self {
            Self::PublicRegistry { image } => ImageSource::Registry {
                image: image.clone(),
            },
            Self::PrebuiltImage { repository, tag } => ImageSource::PrebuiltRepository {
                repository: repository.clone(),
                tag: tag.clone(),
            },
        }
    }
}

/// Stack inputs, resolved once at declaration time. Every field has a
/// documented default; `new` fills them all in.
#[derive(Debug, Clone)]
pub struct StackProps {
    /// Stack name; prefixes resource, secret, and parameter names
    pub name: String,

    /// Administrator email seeded into the admin secret
    pub admin_email: String,

    /// Image selection (default: public registry, purplship-server latest)
    pub profile: DeploymentProfile,

    /// Internet-facing load balancer (default true)
    pub public_facing: bool,

    /// Container listening port (default 5002)
    pub port: u16,

    /// Desired replica count (default 1)
    pub task_count: u32,

    /// Task memory limit in MiB (default 4096)
    pub task_memory_mib: u32,

    /// Task CPU units (default 2048)
    pub task_cpu: u32,

    /// Per-container telemetry collection (default false)
    pub container_insights: bool,

    /// Service name (default "{name}-service")
    pub service_name: Option<String>,

    /// Container name (default "{name}-container")
    pub container_name: Option<String>,

    /// Database name (default "{name}")
    pub database_name: Option<String>,

    /// Managed database overrides
    pub database: DatabaseConfig,

    /// Application environment overrides
    pub env: AppEnvConfig,

    /// Id of a pre-existing network declaration to reuse. The caller keeps
    /// ownership; the stack declares its own network when absent.
    pub network: Option<String>,
}

impl StackProps {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            name: super::DEFAULT_NAME.to_string(),
            admin_email: admin_email.into(),
            profile: DeploymentProfile::PublicRegistry {
                image: super::DEFAULT_IMAGE.to_string(),
            },
            public_facing: true,
            port: super::DEFAULT_PORT,
            task_count: 1,
            task_memory_mib: 4096,
            task_cpu: 2048,
            container_insights: false,
            service_name: None,
            container_name: None,
            database_name: None,
            database: DatabaseConfig::default(),
            env: AppEnvConfig::default(),
            network: None,
        }
    }

    /// Build props from a parsed shipstack.yaml.
    pub fn from_config(config: &StackConfig) -> Self {
        let profile = match config.profile {
            ConfigProfile::PublicRegistry => DeploymentProfile::PublicRegistry {
                image: config
                    .image
                    .clone()
                    .unwrap_or_else(|| super::DEFAULT_IMAGE.to_string()),
            },
            ConfigProfile::PrebuiltImage => DeploymentProfile::PrebuiltImage {
                repository: config.repository.clone().unwrap_or_default(),
                tag: config.image_tag.clone(),
            },
        };
        Self {
            name: config.name.clone(),
            admin_email: config.admin_email.clone(),
            profile,
            public_facing: config.public_facing,
            port: config.port,
            task_count: config.task_count,
            task_memory_mib: config.task_memory_mib,
            task_cpu: config.task_cpu,
            container_insights: config.container_insights,
            service_name: config.service_name.clone(),
            container_name: config.container_name.clone(),
            database_name: config.database_name.clone(),
            database: config.database.clone(),
            env: config.env.clone(),
            network: None,
        }
    }
}

/// Handles to the stack's declared resources.
#[derive(Debug, Clone)]
pub struct DeploymentStack {
    pub network: String,
    pub cluster: String,
    pub secrets: SecretBundle,
    pub database: ManagedDatabaseInstance,
    pub service: String,
}

impl DeploymentStack {
    /// Declare the full stack into a fresh graph.
    pub fn declare(props: &StackProps) -> Result<(ResourceGraph, Self), String> {
        let mut graph = ResourceGraph::new(&props.name);
        let stack = Self::declare_into(&mut graph, props)?;
        Ok((graph, stack))
    }

    /// Declare the stack into a caller-owned graph, reusing a pre-existing
    /// network when `props.network` names one.
    pub fn declare_into(graph: &mut ResourceGraph, props: &StackProps) -> Result<Self, String> {
        let name = &props.name;

        let network = match &props.network {
            Some(id) => {
                match graph.get(id).map(|d| d.spec.kind()) {
                    Some("network") => {}
                    Some(kind) => {
                        return Err(format!(
                            "supplied network '{}' is a {}, not a network",
                            id, kind
                        ))
                    }
                    None => return Err(format!("supplied network '{}' is not declared", id)),
                }
                id.clone()
            }
            None => {
                graph.declare("network", ResourceSpec::Network(default_network()), &[])?;
                "network".to_string()
            }
        };

        graph.declare(
            "cluster",
            ResourceSpec::Cluster(ClusterSpec {
                cluster_name: format!("{}-cluster", name),
                network: network.clone(),
                container_insights: props.container_insights,
            }),
            &[network.as_str()],
        )?;

        let secrets = SecretBundle::declare(
            graph,
            &SecretBundleProps {
                base_name: name.clone(),
                admin_email: props.admin_email.clone(),
            },
        )?;

        let database_name = props
            .database_name
            .clone()
            .unwrap_or_else(|| name.clone());
        let database = ManagedDatabaseInstance::declare(graph, "database", {
            let mut db_props = DatabaseProps::new(network.clone());
            db_props.base_name = name.clone();
            db_props.credentials = Some(secrets.db.clone());
            db_props.database_name = database_name.clone();
            db_props.instance_identifier = name.clone();
            db_props.instance_class = props.database.instance_class.clone();
            db_props.engine_version = props.database.engine_version.clone();
            db_props.multi_az = props.database.multi_az;
            db_props
        })?;

        graph.declare(
            "log-group",
            ResourceSpec::LogGroup(LogGroupSpec {
                log_group_name: format!("/services/{}-server", name),
                stream_prefix: format!("{}-server", name),
                retention_days: 7,
                removal_policy: RemovalPolicy::Destroy,
            }),
            &[],
        )?;

        let environment = app_environment(&props.env, &database, &database_name);
        let secret_env = secret_environment(&secrets);

        graph.declare(
            "service",
            ResourceSpec::ContainerService(ContainerServiceSpec {
                service_name: props
                    .service_name
                    .clone()
                    .unwrap_or_else(|| format!("{}-service", name)),
                container_name: props
                    .container_name
                    .clone()
                    .unwrap_or_else(|| format!("{}-container", name)),
                cluster: "cluster".to_string(),
                image: props.profile.image_source(),
                container_port: props.port,
                desired_count: props.task_count,
                memory_limit_mib: props.task_memory_mib,
                cpu: props.task_cpu,
                public_facing: props.public_facing,
                environment,
                secrets: secret_env,
                log_group: "log-group".to_string(),
                // The trailing slash is important to ensure an http 200
                // response from the application's login route.
                health_check: HealthCheck {
                    path: "/login/".to_string(),
                    healthy_http_codes: "200-299".to_string(),
                },
            }),
            &[
                "cluster",
                database.handle.id.as_str(),
                "log-group",
                secrets.admin.id.as_str(),
                secrets.app.id.as_str(),
                secrets.db.id.as_str(),
            ],
        )?;

        // Declared last: needs both endpoints and the database's assigned port.
        graph.declare(
            "database-access",
            ResourceSpec::AccessRule(AccessRuleSpec {
                from_service: "service".to_string(),
                to_database: database.handle.id.clone(),
                port: database.handle.port,
                protocol: "tcp".to_string(),
            }),
            &["service", database.handle.id.as_str()],
        )?;

        graph.output("NetworkId", Value::attr(&network, "network_id"));
        graph.output(
            "LoadBalancerDnsName",
            Value::attr("service", "load_balancer_dns_name"),
        );

        Ok(Self {
            network,
            cluster: "cluster".to_string(),
            secrets,
            database,
            service: "service".to_string(),
        })
    }
}

fn default_network() -> NetworkSpec {
    NetworkSpec {
        cidr: "10.0.0.0/16".to_string(),
        max_azs: 2,
        subnets: vec![
            SubnetSpec {
                name: "Public".to_string(),
                cidr_mask: 24,
                tier: SubnetTier::Public,
            },
            SubnetSpec {
                name: "Private".to_string(),
                cidr_mask: 24,
                tier: SubnetTier::Private,
            },
            SubnetSpec {
                name: "Isolated".to_string(),
                cidr_mask: 24,
                tier: SubnetTier::Isolated,
            },
        ],
        nat_gateways: 1,
        nat_gateway_subnet: "Public".to_string(),
    }
}

/// The purplship-server environment variable contract. Boolean flags go
/// through `python_bool_str`; the database host and port stay deferred
/// references the engine resolves after provisioning.
fn app_environment(
    env: &AppEnvConfig,
    database: &ManagedDatabaseInstance,
    database_name: &str,
) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    map.insert(
        "DEBUG_MODE".to_string(),
        Value::literal(python_bool_str(env.debug_mode)),
    );
    map.insert(
        "ALLOWED_HOSTS".to_string(),
        Value::literal(&env.allowed_hosts),
    );
    map.insert(
        "DATABASE_HOST".to_string(),
        database.handle.endpoint_address(),
    );
    map.insert("DATABASE_PORT".to_string(), database.handle.endpoint_port());
    map.insert("DATABASE_NAME".to_string(), Value::literal(database_name));
    map.insert(
        "DATABASE_ENGINE".to_string(),
        Value::literal("postgresql_psycopg2"),
    );
    map.insert(
        "USE_HTTPS".to_string(),
        Value::literal(python_bool_str(env.use_https)),
    );
    map.insert(
        "PURPLSHIP_WORKERS".to_string(),
        Value::literal(env.workers.to_string()),
    );
    map.insert(
        "BACKGROUND_WORKERS".to_string(),
        Value::literal(env.background_workers.to_string()),
    );
    map.insert(
        "DETACHED_WORKER".to_string(),
        Value::literal(python_bool_str(env.detached_worker)),
    );
    map.insert("WORK_DIR".to_string(), Value::literal(&env.work_dir));
    map.insert("LOG_DIR".to_string(), Value::literal(&env.log_dir));
    map.insert(
        "WORKER_DB_DIR".to_string(),
        Value::literal(&env.worker_db_dir),
    );
    map.insert(
        "STATIC_ROOT_DIR".to_string(),
        Value::literal(&env.static_root_dir),
    );
    map
}

/// Secret-backed environment: (secret, field) references only, resolved by
/// the engine at container start. No secret value is ever read here.
fn secret_environment(secrets: &SecretBundle) -> IndexMap<String, SecretBinding> {
    let mut map = IndexMap::new();
    map.insert(
        "DATABASE_USERNAME".to_string(),
        SecretBinding::new(&secrets.db.id, "username"),
    );
    map.insert(
        "DATABASE_PASSWORD".to_string(),
        SecretBinding::new(&secrets.db.id, "password"),
    );
    map.insert(
        "ADMIN_EMAIL".to_string(),
        SecretBinding::new(&secrets.admin.id, "email"),
    );
    map.insert(
        "ADMIN_PASSWORD".to_string(),
        SecretBinding::new(&secrets.admin.id, "password"),
    );
    map.insert(
        "SECRET_KEY".to_string(),
        SecretBinding::new(&secrets.app.id, "key"),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> (ResourceGraph, DeploymentStack) {
        DeploymentStack::declare(&StackProps::new("ops@example.com")).unwrap()
    }

    fn service_spec(graph: &ResourceGraph) -> &ContainerServiceSpec {
        match &graph.get("service").unwrap().spec {
            ResourceSpec::ContainerService(s) => s,
            other => panic!("expected service, got {}", other.kind()),
        }
    }

    #[test]
    fn test_stack_declares_expected_resource_counts() {
        let (graph, _) = declared();
        assert_eq!(graph.count_kind("network"), 1);
        assert_eq!(graph.count_kind("cluster"), 1);
        assert_eq!(graph.count_kind("secret"), 3);
        assert_eq!(graph.count_kind("database_instance"), 1);
        assert_eq!(graph.count_kind("container_service"), 1);
        assert_eq!(graph.count_kind("log_group"), 1);
        assert_eq!(graph.count_kind("access_rule"), 1);
    }

    #[test]
    fn test_stack_validates_cleanly() {
        let (graph, _) = declared();
        let errors = graph.validate();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_provisioning_order_invariants() {
        let (graph, stack) = declared();
        let order = graph.execution_order().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos(&stack.network) < pos("cluster"));
        assert!(pos(&stack.secrets.db.id) < pos("database"));
        assert!(pos("database") < pos("service"));
        assert!(pos("service") < pos("database-access"));
        assert!(pos("database") < pos("database-access"));
    }

    #[test]
    fn test_boolean_flags_use_python_casing() {
        let (graph, _) = declared();
        let env = &service_spec(&graph).environment;
        assert_eq!(env["DEBUG_MODE"], Value::literal("True"));
        assert_eq!(env["USE_HTTPS"], Value::literal("False"));
        assert_eq!(env["DETACHED_WORKER"], Value::literal("False"));
    }

    #[test]
    fn test_boolean_overrides_flip_casing_not_format() {
        let mut props = StackProps::new("ops@example.com");
        props.env.debug_mode = false;
        props.env.use_https = true;
        let (graph, _) = DeploymentStack::declare(&props).unwrap();
        let env = &service_spec(&graph).environment;
        assert_eq!(env["DEBUG_MODE"], Value::literal("False"));
        assert_eq!(env["USE_HTTPS"], Value::literal("True"));
    }

    #[test]
    fn test_environment_contract_names_present() {
        let (graph, _) = declared();
        let env = &service_spec(&graph).environment;
        for name in [
            "DEBUG_MODE",
            "ALLOWED_HOSTS",
            "DATABASE_HOST",
            "DATABASE_PORT",
            "DATABASE_NAME",
            "DATABASE_ENGINE",
            "USE_HTTPS",
            "PURPLSHIP_WORKERS",
            "BACKGROUND_WORKERS",
            "DETACHED_WORKER",
            "WORK_DIR",
            "LOG_DIR",
            "WORKER_DB_DIR",
            "STATIC_ROOT_DIR",
        ] {
            assert!(env.contains_key(name), "missing env var {}", name);
        }
        assert_eq!(env["DATABASE_ENGINE"], Value::literal("postgresql_psycopg2"));
        assert_eq!(env["PURPLSHIP_WORKERS"], Value::literal("2"));
        assert_eq!(env["WORK_DIR"], Value::literal("/pship/app"));
    }

    #[test]
    fn test_database_endpoint_is_deferred_reference() {
        let (graph, stack) = declared();
        let env = &service_spec(&graph).environment;
        assert_eq!(
            env["DATABASE_HOST"],
            Value::attr(&stack.database.handle.id, "endpoint_address")
        );
        assert_eq!(
            env["DATABASE_PORT"],
            Value::attr(&stack.database.handle.id, "endpoint_port")
        );
    }

    #[test]
    fn test_secret_env_declared_as_references() {
        let (graph, stack) = declared();
        let secrets = &service_spec(&graph).secrets;
        assert_eq!(
            secrets["DATABASE_USERNAME"],
            SecretBinding::new(&stack.secrets.db.id, "username")
        );
        assert_eq!(
            secrets["DATABASE_PASSWORD"],
            SecretBinding::new(&stack.secrets.db.id, "password")
        );
        assert_eq!(
            secrets["ADMIN_EMAIL"],
            SecretBinding::new(&stack.secrets.admin.id, "email")
        );
        assert_eq!(
            secrets["ADMIN_PASSWORD"],
            SecretBinding::new(&stack.secrets.admin.id, "password")
        );
        assert_eq!(
            secrets["SECRET_KEY"],
            SecretBinding::new(&stack.secrets.app.id, "key")
        );
    }

    #[test]
    fn test_health_check_keeps_trailing_slash() {
        let (graph, _) = declared();
        let check = &service_spec(&graph).health_check;
        assert_eq!(check.path, "/login/");
        assert!(check.path.ends_with("/login/"));
        assert!(!check.path.contains("//"));
        assert_eq!(check.healthy_http_codes, "200-299");
    }

    #[test]
    fn test_access_rule_matches_database_port() {
        let (graph, stack) = declared();
        let rule = match &graph.get("database-access").unwrap().spec {
            ResourceSpec::AccessRule(rule) => rule,
            other => panic!("expected access rule, got {}", other.kind()),
        };
        let db = match &graph.get(&stack.database.handle.id).unwrap().spec {
            ResourceSpec::DatabaseInstance(db) => db,
            other => panic!("expected database, got {}", other.kind()),
        };
        assert_eq!(rule.port, db.port);
        assert_eq!(rule.from_service, "service");
        assert_eq!(rule.protocol, "tcp");
    }

    #[test]
    fn test_database_single_az_without_override() {
        let (graph, _) = declared();
        match &graph.get("database").unwrap().spec {
            ResourceSpec::DatabaseInstance(db) => assert!(!db.multi_az),
            other => panic!("expected database, got {}", other.kind()),
        }
    }

    #[test]
    fn test_default_network_shape() {
        let (graph, stack) = declared();
        match &graph.get(&stack.network).unwrap().spec {
            ResourceSpec::Network(net) => {
                assert_eq!(net.cidr, "10.0.0.0/16");
                assert_eq!(net.max_azs, 2);
                assert_eq!(net.subnets.len(), 3);
                assert!(net
                    .subnets
                    .iter()
                    .all(|s| s.cidr_mask == 24));
                assert_eq!(net.nat_gateways, 1);
                assert_eq!(net.nat_gateway_subnet, "Public");
            }
            other => panic!("expected network, got {}", other.kind()),
        }
    }

    #[test]
    fn test_reuses_supplied_network() {
        let mut graph = ResourceGraph::new("purplship");
        graph
            .declare(
                "shared-network",
                ResourceSpec::Network(default_network()),
                &[],
            )
            .unwrap();
        let mut props = StackProps::new("ops@example.com");
        props.network = Some("shared-network".to_string());
        let stack = DeploymentStack::declare_into(&mut graph, &props).unwrap();
        assert_eq!(stack.network, "shared-network");
        assert_eq!(graph.count_kind("network"), 1);
        assert!(graph.get("network").is_none());
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn test_rejects_unknown_supplied_network() {
        let mut graph = ResourceGraph::new("purplship");
        let mut props = StackProps::new("ops@example.com");
        props.network = Some("ghost".to_string());
        let err = DeploymentStack::declare_into(&mut graph, &props).unwrap_err();
        assert!(err.contains("not declared"));
    }

    #[test]
    fn test_prebuilt_image_profile() {
        let mut props = StackProps::new("ops@example.com");
        props.profile = DeploymentProfile::PrebuiltImage {
            repository: "purplship/purplship-server".to_string(),
            tag: "2021.7".to_string(),
        };
        let (graph, _) = DeploymentStack::declare(&props).unwrap();
        assert_eq!(
            service_spec(&graph).image,
            ImageSource::PrebuiltRepository {
                repository: "purplship/purplship-server".to_string(),
                tag: "2021.7".to_string(),
            }
        );
    }

    #[test]
    fn test_default_sizing() {
        let (graph, _) = declared();
        let spec = service_spec(&graph);
        assert_eq!(spec.container_port, 5002);
        assert_eq!(spec.desired_count, 1);
        assert_eq!(spec.memory_limit_mib, 4096);
        assert_eq!(spec.cpu, 2048);
        assert!(spec.public_facing);
        assert_eq!(spec.service_name, "purplship-service");
        assert_eq!(spec.container_name, "purplship-container");
    }

    #[test]
    fn test_outputs_present() {
        let (graph, _) = declared();
        assert!(graph.outputs().contains_key("NetworkId"));
        assert!(graph.outputs().contains_key("LoadBalancerDnsName"));
        assert!(graph.outputs().contains_key("AdminSecretArn"));
        assert!(graph.outputs().contains_key("AppSecretArn"));
        assert!(graph.outputs().contains_key("DatabaseSecretArn"));
    }

    #[test]
    fn test_from_config_maps_profile_and_overrides() {
        let yaml = r#"
version: "1.0"
name: staging
admin_email: ops@example.com
profile: prebuilt_image
repository: purplship/purplship-server
image_tag: "2021.7"
task_count: 3
database:
  multi_az: true
  instance_class: db.r5.large
env:
  debug_mode: false
"#;
        let config = crate::core::config::parse_config(yaml).unwrap();
        let props = StackProps::from_config(&config);
        assert_eq!(props.name, "staging");
        assert_eq!(props.task_count, 3);
        assert!(props.database.multi_az);
        assert_eq!(props.database.instance_class, "db.r5.large");
        assert!(!props.env.debug_mode);

        let (graph, _) = DeploymentStack::declare(&props).unwrap();
        assert!(graph.validate().is_empty());
        let env = &service_spec(&graph).environment;
        assert_eq!(env["DEBUG_MODE"], Value::literal("False"));
        assert!(graph.registry().get("staging-db-secret-arn").is_some());
    }
}
