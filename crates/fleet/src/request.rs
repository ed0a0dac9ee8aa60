//! The validated, immutable description of one provisioning run.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{FleetError, FleetResult};

/// Whether commands are only shown or actually executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Write the commands out, run nothing.
    #[default]
    Print,
    /// Execute the commands against the cloud.
    Apply,
}

impl Mode {
    /// Interpret an operator answer: `apply` selects [`Mode::Apply`], anything
    /// else [`Mode::Print`].
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().eq_ignore_ascii_case("apply") {
            Self::Apply
        } else {
            Self::Print
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Print => write!(f, "print"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// A regional subnet to create before the instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetSpec {
    /// Subnet resource name.
    pub name: String,
    /// Primary CIDR range, e.g. `10.10.0.0/24`.
    pub range: String,
}

/// Derive the region from a zone by keeping its first two dash-separated
/// components (`us-west1-b` -> `us-west1`).
///
/// A zone with fewer than two components is returned unchanged.
#[must_use]
pub fn derive_region(zone: &str) -> String {
    let mut parts = zone.splitn(3, '-');
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => format!("{first}-{second}"),
        _ => zone.to_string(),
    }
}

/// Parameters for one run. Built once through [`ProvisioningRequest::new`];
/// there are no mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningRequest {
    project_id: String,
    zone: String,
    region: String,
    storage_size_gb: u32,
    vm_names: Vec<String>,
    service_account: String,
    subnet: Option<SubnetSpec>,
    mode: Mode,
}

/// Unvalidated inputs for [`ProvisioningRequest::new`].
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub project_id: String,
    pub zone: String,
    pub storage_size_gb: u32,
    pub vm_names: Vec<String>,
    pub service_account: String,
    /// CIDR range of a subnet to create; the name is derived from the region.
    pub subnet_range: Option<String>,
    pub subnet_prefix: String,
    pub mode: Mode,
}

impl ProvisioningRequest {
    /// Validate the parameters and derive the region.
    ///
    /// # Errors
    /// Returns an error if the VM list is empty, a name is blank or repeated,
    /// the storage size is zero, or the project, zone or service account is
    /// empty.
    pub fn new(params: RequestParams) -> FleetResult<Self> {
        let RequestParams {
            project_id,
            zone,
            storage_size_gb,
            vm_names,
            service_account,
            subnet_range,
            subnet_prefix,
            mode,
        } = params;

        let project_id = non_empty(project_id, "Project ID")?;
        let zone = non_empty(zone, "Zone")?;
        let service_account = non_empty(service_account, "Service account")?;

        if storage_size_gb == 0 {
            return Err(FleetError::InvalidStorageSize("0".into()));
        }
        if vm_names.is_empty() {
            return Err(FleetError::InvalidCount("0".into()));
        }

        let names = validate_names(vm_names)?;
        let region = derive_region(&zone);
        let subnet = subnet_range
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .map(|range| SubnetSpec {
                name: format!("{subnet_prefix}-{region}"),
                range,
            });

        Ok(Self {
            project_id,
            zone,
            region,
            storage_size_gb,
            vm_names: names,
            service_account,
            subnet,
            mode,
        })
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Region derived from the zone.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn storage_size_gb(&self) -> u32 {
        self.storage_size_gb
    }

    /// VM names in operator order.
    #[must_use]
    pub fn vm_names(&self) -> &[String] {
        &self.vm_names
    }

    #[must_use]
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    #[must_use]
    pub fn subnet(&self) -> Option<&SubnetSpec> {
        self.subnet.as_ref()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// Trim VM names and reject blank or repeated ones.
///
/// # Errors
/// Returns [`FleetError::EmptyName`] or [`FleetError::DuplicateName`].
pub fn validate_names(vm_names: Vec<String>) -> FleetResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(vm_names.len());
    for (i, name) in vm_names.into_iter().enumerate() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(FleetError::EmptyName(i + 1));
        }
        if !seen.insert(name.clone()) {
            return Err(FleetError::DuplicateName(name));
        }
        names.push(name);
    }
    Ok(names)
}

fn non_empty(value: String, what: &'static str) -> FleetResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Empty(what));
    }
    Ok(trimmed.to_string())
}
