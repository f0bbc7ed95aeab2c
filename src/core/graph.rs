//! Resource graph — declaration registry, reference validation, and
//! deterministic provisioning order.
//!
//! The graph holds immutable declarations keyed by id, plus the outputs and
//! parameter-store entries the stack publishes. Provisioning order comes
//! from explicit depends_on edges via Kahn's algorithm with alphabetical
//! tie-breaking.

use super::registry::ParameterRegistry;
use super::types::*;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(message: String) -> ValidationError {
    ValidationError { message }
}

/// The declared resource graph for one deployable stack.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    name: String,
    resources: IndexMap<String, Declaration>,
    registry: ParameterRegistry,
    outputs: IndexMap<String, Value>,
}

impl ResourceGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: IndexMap::new(),
            registry: ParameterRegistry::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource. Ids are unique; redeclaration is an error.
    pub fn declare(
        &mut self,
        id: impl Into<String>,
        spec: ResourceSpec,
        depends_on: &[&str],
    ) -> Result<(), String> {
        let id = id.into();
        if id.is_empty() {
            return Err("resource id must not be empty".to_string());
        }
        if self.resources.contains_key(&id) {
            return Err(format!("resource '{}' is already declared", id));
        }
        self.resources.insert(
            id,
            Declaration {
                spec,
                depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    pub fn resources(&self) -> &IndexMap<String, Declaration> {
        &self.resources
    }

    /// Count declared resources of one kind tag.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.resources
            .values()
            .filter(|d| d.spec.kind() == kind)
            .count()
    }

    /// Publish a locator to the parameter registry.
    pub fn publish(&mut self, key: impl Into<String>, value: Value) -> Result<(), String> {
        self.registry.publish(key, value)
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Declare a named post-deployment output.
    pub fn output(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    pub fn outputs(&self) -> &IndexMap<String, Value> {
        &self.outputs
    }

    /// Build a provisioning order from depends_on edges.
    /// Kahn's algorithm with alphabetical tie-breaking for determinism.
    pub fn execution_order(&self) -> Result<Vec<String>, String> {
        let ids: Vec<String> = self.resources.keys().cloned().collect();
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

        for id in &ids {
            in_degree.insert(id.clone(), 0);
            adjacency.insert(id.clone(), Vec::new());
        }

        for (id, decl) in &self.resources {
            for dep in &decl.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(format!("resource '{}' depends on unknown '{}'", id, dep));
                }
                adjacency.get_mut(dep).unwrap().push(id.clone());
                *in_degree.get_mut(id).unwrap() += 1;
            }
        }

        let mut queue: VecDeque<String> = VecDeque::new();
        let mut zero_degree: Vec<String> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(id, _)| id.clone())
            .collect();
        zero_degree.sort();
        for id in zero_degree {
            queue.push_back(id);
        }

        let mut order = Vec::new();
        while let Some(current) = queue.pop_front() {
            order.push(current.clone());

            let mut next_ready: Vec<String> = Vec::new();
            if let Some(neighbors) = adjacency.get(&current) {
                for neighbor in neighbors {
                    let degree = in_degree.get_mut(neighbor).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor.clone());
                    }
                }
            }
            next_ready.sort();
            for id in next_ready {
                queue.push_back(id);
            }
        }

        if order.len() != ids.len() {
            let remaining: HashSet<_> = ids.iter().collect();
            let ordered: HashSet<_> = order.iter().collect();
            let cycle_members: Vec<_> = remaining.difference(&ordered).collect();
            return Err(format!(
                "dependency cycle detected involving: {}",
                cycle_members
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        Ok(order)
    }

    /// Validate cross-references. Returns a list of errors (empty = valid).
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (id, decl) in &self.resources {
            for dep in &decl.depends_on {
                if !self.resources.contains_key(dep) {
                    errors.push(err(format!(
                        "resource '{}' depends on unknown resource '{}'",
                        id, dep
                    )));
                }
                if dep == id {
                    errors.push(err(format!("resource '{}' depends on itself", id)));
                }
            }

            match &decl.spec {
                ResourceSpec::Network(net) => self.validate_network(id, net, &mut errors),
                ResourceSpec::Cluster(cluster) => {
                    self.expect_kind(id, &cluster.network, "network", &mut errors);
                }
                ResourceSpec::Secret(secret) => {
                    if secret.secret_name.is_empty() {
                        errors.push(err(format!("secret '{}' has no name", id)));
                    }
                    if secret.generate_field.is_empty() {
                        errors.push(err(format!("secret '{}' generates no field", id)));
                    }
                }
                ResourceSpec::DatabaseInstance(db) => self.validate_database(id, db, &mut errors),
                ResourceSpec::ContainerService(service) => {
                    self.validate_service(id, service, &mut errors);
                }
                ResourceSpec::LogGroup(group) => {
                    if group.log_group_name.is_empty() {
                        errors.push(err(format!("log group '{}' has no name", id)));
                    }
                }
                ResourceSpec::AccessRule(rule) => self.validate_access_rule(id, rule, &mut errors),
            }
        }

        for (name, value) in &self.outputs {
            self.check_reference(&format!("output '{}'", name), value, &mut errors);
        }
        for (key, value) in self.registry.iter() {
            self.check_reference(&format!("parameter '{}'", key), value, &mut errors);
        }

        errors
    }

    fn kind_of(&self, id: &str) -> Option<&'static str> {
        self.resources.get(id).map(|d| d.spec.kind())
    }

    fn expect_kind(&self, id: &str, target: &str, kind: &str, errors: &mut Vec<ValidationError>) {
        match self.kind_of(target) {
            None => errors.push(err(format!(
                "resource '{}' references unknown resource '{}'",
                id, target
            ))),
            Some(actual) if actual != kind => errors.push(err(format!(
                "resource '{}' references '{}' as a {}, but it is a {}",
                id, target, kind, actual
            ))),
            Some(_) => {}
        }
    }

    fn check_reference(&self, context: &str, value: &Value, errors: &mut Vec<ValidationError>) {
        if let Some(target) = value.referenced_resource() {
            if !self.resources.contains_key(target) {
                errors.push(err(format!(
                    "{} references unknown resource '{}'",
                    context, target
                )));
            }
        }
    }

    fn validate_network(&self, id: &str, net: &NetworkSpec, errors: &mut Vec<ValidationError>) {
        if net.cidr.is_empty() {
            errors.push(err(format!("network '{}' has no address range", id)));
        }
        if net.nat_gateways > 0 {
            match net.subnets.iter().find(|s| s.name == net.nat_gateway_subnet) {
                None => errors.push(err(format!(
                    "network '{}' places the outbound gateway in unknown subnet group '{}'",
                    id, net.nat_gateway_subnet
                ))),
                Some(subnet) if subnet.tier != SubnetTier::Public => errors.push(err(format!(
                    "network '{}' places the outbound gateway in non-public subnet group '{}'",
                    id, net.nat_gateway_subnet
                ))),
                Some(_) => {}
            }
        }
    }

    fn validate_database(&self, id: &str, db: &DatabaseSpec, errors: &mut Vec<ValidationError>) {
        self.expect_kind(id, &db.network, "network", errors);
        if db.port == 0 {
            errors.push(err(format!("database '{}' has port 0", id)));
        }
        match self.resources.get(&db.credentials).map(|d| &d.spec) {
            Some(ResourceSpec::Secret(secret)) => {
                // Credentials must resolve to username + password at deploy time.
                for field in ["username", "password"] {
                    if !secret.has_field(field) {
                        errors.push(err(format!(
                            "database '{}' credentials secret '{}' lacks field '{}'",
                            id, db.credentials, field
                        )));
                    }
                }
            }
            Some(_) => errors.push(err(format!(
                "database '{}' credentials '{}' is not a secret",
                id, db.credentials
            ))),
            None => errors.push(err(format!(
                "database '{}' references unknown secret '{}'",
                id, db.credentials
            ))),
        }
    }

    fn validate_service(
        &self,
        id: &str,
        service: &ContainerServiceSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        self.expect_kind(id, &service.cluster, "cluster", errors);
        self.expect_kind(id, &service.log_group, "log_group", errors);

        for (name, value) in &service.environment {
            self.check_reference(&format!("service '{}' env '{}'", id, name), value, errors);
        }

        for (name, binding) in &service.secrets {
            match self.resources.get(&binding.secret).map(|d| &d.spec) {
                Some(ResourceSpec::Secret(secret)) => {
                    if !secret.has_field(&binding.field) {
                        errors.push(err(format!(
                            "service '{}' secret env '{}' binds missing field '{}' of '{}'",
                            id, name, binding.field, binding.secret
                        )));
                    }
                }
                Some(_) => errors.push(err(format!(
                    "service '{}' secret env '{}' references non-secret '{}'",
                    id, name, binding.secret
                ))),
                None => errors.push(err(format!(
                    "service '{}' secret env '{}' references unknown secret '{}'",
                    id, name, binding.secret
                ))),
            }
        }
    }

    fn validate_access_rule(
        &self,
        id: &str,
        rule: &AccessRuleSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        self.expect_kind(id, &rule.from_service, "container_service", errors);
        match self.resources.get(&rule.to_database).map(|d| &d.spec) {
            Some(ResourceSpec::DatabaseInstance(db)) => {
                if db.port != rule.port {
                    errors.push(err(format!(
                        "access rule '{}' opens port {} but database '{}' listens on {}",
                        id, rule.port, rule.to_database, db.port
                    )));
                }
            }
            Some(_) => errors.push(err(format!(
                "access rule '{}' target '{}' is not a database",
                id, rule.to_database
            ))),
            None => errors.push(err(format!(
                "access rule '{}' references unknown database '{}'",
                id, rule.to_database
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn network_spec() -> ResourceSpec {
        ResourceSpec::Network(NetworkSpec {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            subnets: vec![
                SubnetSpec {
                    name: "Public".to_string(),
                    cidr_mask: 24,
                    tier: SubnetTier::Public,
                },
                SubnetSpec {
                    name: "Isolated".to_string(),
                    cidr_mask: 24,
                    tier: SubnetTier::Isolated,
                },
            ],
            nat_gateways: 1,
            nat_gateway_subnet: "Public".to_string(),
        })
    }

    fn secret_spec(name: &str, username_seed: bool) -> ResourceSpec {
        let mut seed = IndexMap::new();
        if username_seed {
            seed.insert("username".to_string(), "postgres".to_string());
        }
        ResourceSpec::Secret(SecretSpec {
            secret_name: name.to_string(),
            seed,
            generate_field: "password".to_string(),
            rule: GenerationRule {
                exclude_punctuation: true,
                include_space: false,
            },
        })
    }

    fn database_spec(network: &str, credentials: &str) -> ResourceSpec {
        ResourceSpec::DatabaseInstance(DatabaseSpec {
            engine: "postgres".to_string(),
            version: "13.2".to_string(),
            instance_class: "db.t3.micro".to_string(),
            database_name: "purplship".to_string(),
            instance_identifier: "purplship".to_string(),
            port: 5432,
            multi_az: false,
            network: network.to_string(),
            credentials: credentials.to_string(),
        })
    }

    #[test]
    fn test_declare_rejects_duplicate_id() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        let result = graph.declare("network", network_spec(), &[]);
        assert!(result.unwrap_err().contains("already declared"));
    }

    #[test]
    fn test_declare_rejects_empty_id() {
        let mut graph = ResourceGraph::new("test");
        assert!(graph.declare("", network_spec(), &[]).is_err());
    }

    #[test]
    fn test_execution_order_linear() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        graph
            .declare("secret", secret_spec("app/db", true), &[])
            .unwrap();
        graph
            .declare(
                "database",
                database_spec("network", "secret"),
                &["network", "secret"],
            )
            .unwrap();
        let order = graph.execution_order().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("network") < pos("database"));
        assert!(pos("secret") < pos("database"));
    }

    #[test]
    fn test_execution_order_alphabetical_tie_break() {
        let mut graph = ResourceGraph::new("test");
        graph
            .declare("beta", secret_spec("b", false), &[])
            .unwrap();
        graph
            .declare("alpha", secret_spec("a", false), &[])
            .unwrap();
        let order = graph.execution_order().unwrap();
        assert_eq!(order, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_execution_order_cycle_detected() {
        let mut graph = ResourceGraph::new("test");
        graph
            .declare("a", secret_spec("a", false), &["b"])
            .unwrap();
        graph
            .declare("b", secret_spec("b", false), &["a"])
            .unwrap();
        let result = graph.execution_order();
        assert!(result.unwrap_err().contains("cycle"));
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let mut graph = ResourceGraph::new("test");
        graph
            .declare("secret", secret_spec("s", false), &["ghost"])
            .unwrap();
        let errors = graph.validate();
        assert!(errors.iter().any(|e| e.message.contains("unknown resource")));
    }

    #[test]
    fn test_validate_nat_gateway_must_be_public() {
        let mut graph = ResourceGraph::new("test");
        graph
            .declare(
                "network",
                ResourceSpec::Network(NetworkSpec {
                    cidr: "10.0.0.0/16".to_string(),
                    max_azs: 2,
                    subnets: vec![SubnetSpec {
                        name: "Isolated".to_string(),
                        cidr_mask: 24,
                        tier: SubnetTier::Isolated,
                    }],
                    nat_gateways: 1,
                    nat_gateway_subnet: "Isolated".to_string(),
                }),
                &[],
            )
            .unwrap();
        let errors = graph.validate();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("non-public subnet group")));
    }

    #[test]
    fn test_validate_nat_gateway_unknown_subnet() {
        let mut graph = ResourceGraph::new("test");
        graph
            .declare(
                "network",
                ResourceSpec::Network(NetworkSpec {
                    cidr: "10.0.0.0/16".to_string(),
                    max_azs: 2,
                    subnets: vec![],
                    nat_gateways: 1,
                    nat_gateway_subnet: "Public".to_string(),
                }),
                &[],
            )
            .unwrap();
        let errors = graph.validate();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("unknown subnet group")));
    }

    #[test]
    fn test_validate_database_credentials_fields() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        // Secret without a username seed cannot back database credentials.
        graph
            .declare("secret", secret_spec("app/db", false), &[])
            .unwrap();
        graph
            .declare("database", database_spec("network", "secret"), &[])
            .unwrap();
        let errors = graph.validate();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("lacks field 'username'")));
    }

    #[test]
    fn test_validate_access_rule_port_mismatch() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        graph
            .declare("secret", secret_spec("app/db", true), &[])
            .unwrap();
        graph
            .declare("database", database_spec("network", "secret"), &[])
            .unwrap();
        graph
            .declare(
                "rule",
                ResourceSpec::AccessRule(AccessRuleSpec {
                    from_service: "database".to_string(), // wrong kind too
                    to_database: "database".to_string(),
                    port: 5433,
                    protocol: "tcp".to_string(),
                }),
                &[],
            )
            .unwrap();
        let errors = graph.validate();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("listens on 5432")));
    }

    #[test]
    fn test_validate_output_reference() {
        let mut graph = ResourceGraph::new("test");
        graph.output("NetworkId", Value::attr("ghost", "network_id"));
        let errors = graph.validate();
        assert!(errors.iter().any(|e| e.message.contains("output 'NetworkId'")));
    }

    #[test]
    fn test_count_kind() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        graph
            .declare("s1", secret_spec("a", false), &[])
            .unwrap();
        graph
            .declare("s2", secret_spec("b", false), &[])
            .unwrap();
        assert_eq!(graph.count_kind("secret"), 2);
        assert_eq!(graph.count_kind("network"), 1);
        assert_eq!(graph.count_kind("cluster"), 0);
    }

    #[test]
    fn test_valid_graph_has_no_errors() {
        let mut graph = ResourceGraph::new("test");
        graph.declare("network", network_spec(), &[]).unwrap();
        graph
            .declare("secret", secret_spec("app/db", true), &[])
            .unwrap();
        graph
            .declare(
                "database",
                database_spec("network", "secret"),
                &["network", "secret"],
            )
            .unwrap();
        assert!(graph.validate().is_empty());
    }
}
