//! Fixed provisioning policy and run defaults.
//!
//! Everything in [`Policy`] is a constant of the generated commands: it is
//! never derived from operator input. A TOML policy file may override any
//! subset of fields; omitted fields keep the built-in values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Zone offered when the operator leaves the zone prompt blank.
pub const DEFAULT_ZONE: &str = "europe-west1-b";

/// Boot disk size in GB offered when the storage prompt is left blank.
pub const DEFAULT_DISK_SIZE_GB: &str = "50";

/// VM count offered when the count prompt is left blank.
pub const DEFAULT_VM_COUNT: &str = "2";

/// Execution mode offered when the mode prompt is left blank.
pub const DEFAULT_MODE: &str = "print";

/// Default name for the VM at 1-based position `index`.
#[must_use]
pub fn default_vm_name(index: usize) -> String {
    format!("agent-{index}")
}

/// Constants templated into every firewall, subnet and instance command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    // Firewall
    /// Name of the global ingress rule.
    pub firewall_rule: String,
    /// Rule priority.
    pub firewall_priority: u32,
    /// Protocols/ports allowed by the rule.
    pub firewall_rules: String,
    /// Source CIDR ranges allowed by the rule.
    pub firewall_source_ranges: String,

    // Networking
    /// VPC network the rule and subnet attach to.
    pub network: String,
    /// Subnet used by instances when no subnet is created.
    pub default_subnet: String,
    /// Prefix of created subnets; the region is appended.
    pub subnet_prefix: String,
    /// Network interface tier.
    pub network_tier: String,
    /// Network interface stack type.
    pub stack_type: String,

    // Instance
    /// Compute Engine machine type.
    pub machine_type: String,
    /// Instance metadata, already in `key=value,...` form.
    pub metadata: String,
    /// On-host maintenance policy.
    pub maintenance_policy: String,
    /// Provisioning model.
    pub provisioning_model: String,
    /// OAuth scopes granted to the service account.
    pub scopes: Vec<String>,
    /// Labels, rendered in declared order.
    pub labels: Vec<(String, String)>,

    // Boot disk
    /// Boot image reference.
    pub image: String,
    /// Persistent disk type.
    pub disk_type: String,
    /// Snapshot schedule attached to the boot disk, resolved per region.
    pub disk_resource_policy: String,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            firewall_rule: "allow-all".into(),
            firewall_priority: 101,
            firewall_rules: "all".into(),
            firewall_source_ranges: "0.0.0.0/0".into(),
            network: "default".into(),
            default_subnet: "default".into(),
            subnet_prefix: "fleet".into(),
            network_tier: "PREMIUM".into(),
            stack_type: "IPV4_ONLY".into(),
            machine_type: "e2-standard-4".into(),
            metadata: "enable-osconfig=TRUE,enable-oslogin=true".into(),
            maintenance_policy: "MIGRATE".into(),
            provisioning_model: "STANDARD".into(),
            scopes: [
                "https://www.googleapis.com/auth/devstorage.read_only",
                "https://www.googleapis.com/auth/logging.write",
                "https://www.googleapis.com/auth/monitoring.write",
                "https://www.googleapis.com/auth/service.management.readonly",
                "https://www.googleapis.com/auth/servicecontrol",
                "https://www.googleapis.com/auth/trace.append",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            labels: vec![
                (
                    "goog-ops-agent-policy".into(),
                    "v2-x86-template-1-4-0".into(),
                ),
                ("goog-ec-src".into(), "vm_add-gcloud".into()),
            ],
            image: "projects/debian-cloud/global/images/debian-12-bookworm-v20250513".into(),
            disk_type: "pd-balanced".into(),
            disk_resource_policy: "default-schedule-1".into(),
        }
    }
}

impl Policy {
    /// Parse a policy from TOML text. Missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns [`FleetError::Policy`] if the text is not a valid policy.
    pub fn from_toml(text: &str) -> FleetResult<Self> {
        let policy: Self = toml::from_str(text).map_err(|e| FleetError::Policy(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy file from disk.
    ///
    /// # Errors
    /// Returns [`FleetError::Policy`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> FleetResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FleetError::Policy(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Labels in the `k=v,k=v` form passed to `--labels`, in declared order.
    #[must_use]
    pub fn labels_arg(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn validate(&self) -> FleetResult<()> {
        let required = [
            ("firewall_rule", &self.firewall_rule),
            ("network", &self.network),
            ("machine_type", &self.machine_type),
            ("image", &self.image),
            ("disk_type", &self.disk_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(FleetError::Policy(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}
