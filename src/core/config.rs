//! Deployment configuration — shipstack.yaml parsing and validation.
//!
//! The config file carries the operator-supplied knobs (admin email, image,
//! sizing, application environment overrides). Everything not set falls back
//! to the documented evaluation defaults when the stack is declared.

use super::graph::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Which deployment profile to synthesize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigProfile {
    /// Pull the application image from a public registry
    #[default]
    PublicRegistry,
    /// Reuse an image already pushed to a provider-hosted repository
    PrebuiltImage,
}

/// Root deployment configuration (shipstack.yaml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Stack name; prefixes resource and parameter names
    #[serde(default = "default_name")]
    pub name: String,

    /// Administrator email seeded into the admin secret
    pub admin_email: String,

    /// Deployment profile
    #[serde(default)]
    pub profile: ConfigProfile,

    /// Public registry image reference (public_registry profile)
    #[serde(default)]
    pub image: Option<String>,

    /// Provider-hosted repository name (prebuilt_image profile)
    #[serde(default)]
    pub repository: Option<String>,

    /// Image tag (prebuilt_image profile)
    #[serde(default = "default_tag")]
    pub image_tag: String,

    /// Internet-facing load balancer
    #[serde(default = "default_true")]
    pub public_facing: bool,

    /// Container listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Desired replica count
    #[serde(default = "default_task_count")]
    pub task_count: u32,

    /// Task memory limit (MiB)
    #[serde(default = "default_task_memory")]
    pub task_memory_mib: u32,

    /// Task CPU units
    #[serde(default = "default_task_cpu")]
    pub task_cpu: u32,

    /// Per-container telemetry collection
    #[serde(default)]
    pub container_insights: bool,

    /// Service name override (default "{name}-service")
    #[serde(default)]
    pub service_name: Option<String>,

    /// Container name override (default "{name}-container")
    #[serde(default)]
    pub container_name: Option<String>,

    /// Database name override (default "{name}")
    #[serde(default)]
    pub database_name: Option<String>,

    /// Managed database overrides
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Application environment overrides
    #[serde(default)]
    pub env: AppEnvConfig,
}

/// Managed database overrides. Defaults are evaluation-grade; production
/// deployments must set these explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Multi-AZ placement (default false: single-AZ)
    #[serde(default)]
    pub multi_az: bool,

    /// Instance class (default "db.t3.micro")
    #[serde(default = "default_instance_class")]
    pub instance_class: String,

    /// Engine version (default "13.2")
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            multi_az: false,
            instance_class: default_instance_class(),
            engine_version: default_engine_version(),
        }
    }
}

/// Application environment overrides, mapped onto the purplship-server
/// environment variable contract when the stack is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEnvConfig {
    /// DEBUG_MODE (default true)
    #[serde(default = "default_true")]
    pub debug_mode: bool,

    /// USE_HTTPS (default false)
    #[serde(default)]
    pub use_https: bool,

    /// ALLOWED_HOSTS (default "*")
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: String,

    /// PURPLSHIP_WORKERS (default 2)
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// BACKGROUND_WORKERS (default 2)
    #[serde(default = "default_workers")]
    pub background_workers: u32,

    /// DETACHED_WORKER (default false)
    #[serde(default)]
    pub detached_worker: bool,

    /// WORK_DIR (default "/pship/app")
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// LOG_DIR (default "/pship/log")
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// WORKER_DB_DIR (default "/pship/data")
    #[serde(default = "default_worker_db_dir")]
    pub worker_db_dir: String,

    /// STATIC_ROOT_DIR (default "/pship/static")
    #[serde(default = "default_static_root_dir")]
    pub static_root_dir: String,
}

impl Default for AppEnvConfig {
    fn default() -> Self {
        Self {
            debug_mode: true,
            use_https: false,
            allowed_hosts: default_allowed_hosts(),
            workers: default_workers(),
            background_workers: default_workers(),
            detached_worker: false,
            work_dir: default_work_dir(),
            log_dir: default_log_dir(),
            worker_db_dir: default_worker_db_dir(),
            static_root_dir: default_static_root_dir(),
        }
    }
}

fn default_name() -> String {
    "purplship".to_string()
}
fn default_tag() -> String {
    "latest".to_string()
}
fn default_true() -> bool {
    true
}
fn default_port() -> u16 {
    5002
}
fn default_task_count() -> u32 {
    1
}
fn default_task_memory() -> u32 {
    4096
}
fn default_task_cpu() -> u32 {
    2048
}
fn default_instance_class() -> String {
    "db.t3.micro".to_string()
}
fn default_engine_version() -> String {
    "13.2".to_string()
}
fn default_allowed_hosts() -> String {
    "*".to_string()
}
fn default_workers() -> u32 {
    2
}
fn default_work_dir() -> String {
    "/pship/app".to_string()
}
fn default_log_dir() -> String {
    "/pship/log".to_string()
}
fn default_worker_db_dir() -> String {
    "/pship/data".to_string()
}
fn default_static_root_dir() -> String {
    "/pship/static".to_string()
}

/// Parse a shipstack.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a shipstack.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

fn name_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
}

fn email_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn image_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9][a-z0-9._/-]*(:[A-Za-z0-9._-]+)?$").unwrap()
    })
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        fail(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        ));
    }

    if !name_pattern().is_match(&config.name) {
        fail(format!(
            "name '{}' must be lowercase alphanumeric with dashes",
            config.name
        ));
    }

    if !email_pattern().is_match(&config.admin_email) {
        fail(format!(
            "admin_email '{}' is not a plausible email address",
            config.admin_email
        ));
    }

    if config.port == 0 {
        fail("port must be non-zero".to_string());
    }
    if config.task_count == 0 {
        fail("task_count must be at least 1".to_string());
    }
    if config.task_memory_mib == 0 || config.task_cpu == 0 {
        fail("task_memory_mib and task_cpu must be non-zero".to_string());
    }

    match config.profile {
        ConfigProfile::PublicRegistry => {
            if let Some(ref image) = config.image {
                if !image_pattern().is_match(image) {
                    fail(format!("image '{}' is not a valid image reference", image));
                }
            }
        }
        ConfigProfile::PrebuiltImage => match config.repository {
            None => fail("profile prebuilt_image requires a repository".to_string()),
            Some(ref repo) if !image_pattern().is_match(repo) => {
                fail(format!("repository '{}' is not a valid reference", repo));
            }
            Some(_) => {}
        },
    }

    errors
}

/// Starter configuration written by `shipstack init`.
pub const CONFIG_TEMPLATE: &str = r#"version: "1.0"
name: purplship
admin_email: admin@example.com

# public_registry pulls the image below; prebuilt_image reuses an image
# already pushed to your provider repository.
profile: public_registry
image: purplship/purplship-server:latest

public_facing: true
port: 5002
task_count: 1
task_memory_mib: 4096
task_cpu: 2048

database:
  multi_az: false
  instance_class: db.t3.micro
  engine_version: "13.2"

env:
  debug_mode: true
  use_https: false
  allowed_hosts: "*"
"#;
