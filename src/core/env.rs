//! Environment plumbing: the boolean literal convention expected by the
//! deployed application, and deploy account/region resolution.

/// Environment variable selecting the deploy account explicitly.
pub const DEPLOY_ACCOUNT_VAR: &str = "SHIPSTACK_DEPLOY_ACCOUNT";
/// Provider-default account, consulted when no explicit account is set.
pub const DEFAULT_ACCOUNT_VAR: &str = "CLOUD_DEFAULT_ACCOUNT";
/// Environment variable selecting the deploy region explicitly.
pub const DEPLOY_REGION_VAR: &str = "SHIPSTACK_DEPLOY_REGION";
/// Provider-default region, consulted when no explicit region is set.
pub const DEFAULT_REGION_VAR: &str = "CLOUD_DEFAULT_REGION";

/// Render a boolean in python-style casing, per the purplship-server
/// environment variable format. The casing is exact: the deployed
/// application parses "True"/"False" and nothing else.
pub fn python_bool_str(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Account/region pair the template is synthesized for. Either side may be
/// unset, in which case the engine resolves it at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployTarget {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl DeployTarget {
    /// Resolve from the process environment: deploy-specific variable first,
    /// then the provider default, else unset.
    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve through an arbitrary lookup (injectable for tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |deploy: &str, default: &str| {
            lookup(deploy)
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(default).filter(|v| !v.is_empty()))
        };
        Self {
            account: get(DEPLOY_ACCOUNT_VAR, DEFAULT_ACCOUNT_VAR),
            region: get(DEPLOY_REGION_VAR, DEFAULT_REGION_VAR),
        }
    }
}
