//! Rendering of gcloud argument vectors from a [`ProvisioningRequest`].
//!
//! Commands are built as argument vectors and only turned into shell text
//! at the print boundary, so no value ever passes through a shell.

use std::fmt;

use serde::Serialize;

use crate::config::Policy;
use crate::request::ProvisioningRequest;

/// What a rendered command provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Global ingress firewall rule.
    Firewall,
    /// Regional subnet.
    Subnet,
    /// One VM instance.
    InstanceCreate,
}

impl CommandKind {
    /// Firewall and subnet creation must finish before instances start.
    #[must_use]
    pub fn is_prelude(self) -> bool {
        matches!(self, Self::Firewall | Self::Subnet)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firewall => write!(f, "firewall"),
            Self::Subnet => write!(f, "subnet"),
            Self::InstanceCreate => write!(f, "instance"),
        }
    }
}

/// One ready-to-run external invocation. `argv` excludes the program name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedCommand {
    pub kind: CommandKind,
    /// Resource the command creates.
    pub target: Option<String>,
    pub argv: Vec<String>,
}

impl RenderedCommand {
    fn new(kind: CommandKind, target: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            kind,
            target: Some(target.into()),
            argv,
        }
    }

    /// Human label such as `firewall allow-all` or `instance agent-1`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.target {
            Some(target) => format!("{} {target}", self.kind),
            None => self.kind.to_string(),
        }
    }

    /// Shell-quoted command line, suitable for pasting into a terminal.
    #[must_use]
    pub fn shell_line(&self, program: &str) -> String {
        let words = std::iter::once(program).chain(self.argv.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            // Only reachable with interior NUL bytes, which gcloud rejects anyway.
            format!("{program} {}", self.argv.join(" "))
        })
    }
}

/// Build every command for `request`, in execution order: firewall, optional
/// subnet, then one instance per VM name in operator order.
#[must_use]
pub fn build_commands(request: &ProvisioningRequest, policy: &Policy) -> Vec<RenderedCommand> {
    let mut commands = Vec::with_capacity(request.vm_names().len() + 2);
    commands.push(firewall_command(request, policy));
    if let Some(subnet) = subnet_command(request, policy) {
        commands.push(subnet);
    }
    commands.extend(
        request
            .vm_names()
            .iter()
            .map(|name| instance_command(request, policy, name)),
    );
    commands
}

fn firewall_command(request: &ProvisioningRequest, policy: &Policy) -> RenderedCommand {
    let argv = vec![
        "compute".into(),
        "firewall-rules".into(),
        "create".into(),
        policy.firewall_rule.clone(),
        format!("--network={}", policy.network),
        format!("--priority={}", policy.firewall_priority),
        "--direction=INGRESS".into(),
        "--action=ALLOW".into(),
        format!("--rules={}", policy.firewall_rules),
        format!("--source-ranges={}", policy.firewall_source_ranges),
        "--no-enable-logging".into(),
        format!("--project={}", request.project_id()),
    ];
    RenderedCommand::new(CommandKind::Firewall, &policy.firewall_rule, argv)
}

fn subnet_command(request: &ProvisioningRequest, policy: &Policy) -> Option<RenderedCommand> {
    let subnet = request.subnet()?;
    let argv = vec![
        "compute".into(),
        "networks".into(),
        "subnets".into(),
        "create".into(),
        subnet.name.clone(),
        format!("--network={}", policy.network),
        format!("--region={}", request.region()),
        format!("--range={}", subnet.range),
        format!("--project={}", request.project_id()),
    ];
    Some(RenderedCommand::new(CommandKind::Subnet, &subnet.name, argv))
}

fn instance_command(request: &ProvisioningRequest, policy: &Policy, name: &str) -> RenderedCommand {
    let project = request.project_id();
    let subnet = request
        .subnet()
        .map_or(policy.default_subnet.as_str(), |s| s.name.as_str());

    let create_disk = [
        "auto-delete=yes".to_string(),
        "boot=yes".to_string(),
        format!("device-name={name}"),
        format!(
            "disk-resource-policy=projects/{project}/regions/{}/resourcePolicies/{}",
            request.region(),
            policy.disk_resource_policy
        ),
        format!("image={}", policy.image),
        "mode=rw".to_string(),
        format!("size={}", request.storage_size_gb()),
        format!("type={}", policy.disk_type),
    ]
    .join(",");

    let argv = vec![
        "compute".into(),
        "instances".into(),
        "create".into(),
        name.to_string(),
        format!("--project={project}"),
        format!("--zone={}", request.zone()),
        format!("--machine-type={}", policy.machine_type),
        format!(
            "--network-interface=network-tier={},stack-type={},subnet={subnet}",
            policy.network_tier, policy.stack_type
        ),
        format!("--metadata={}", policy.metadata),
        format!("--maintenance-policy={}", policy.maintenance_policy),
        format!("--provisioning-model={}", policy.provisioning_model),
        format!("--service-account={}", request.service_account()),
        format!("--scopes={}", policy.scopes.join(",")),
        format!("--create-disk={create_disk}"),
        "--no-shielded-secure-boot".into(),
        "--shielded-vtpm".into(),
        "--shielded-integrity-monitoring".into(),
        format!("--labels={}", policy.labels_arg()),
        "--reservation-affinity=any".into(),
    ];
    RenderedCommand::new(CommandKind::InstanceCreate, name, argv)
}
