//! Console formatting helpers.
//!
//! Status markers are built as strings so they can go to any writer; the
//! `print_*` variants write straight to stdout.

use colored::Colorize;

use crate::request::ProvisioningRequest;

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print a key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{}", error(message));
}

#[must_use]
pub fn success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message.green())
}

#[must_use]
pub fn warning(message: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), message.yellow())
}

#[must_use]
pub fn error(message: &str) -> String {
    format!("{} {}", "✗".red().bold(), message.red())
}

/// Print what is about to be provisioned.
pub fn print_request_summary(request: &ProvisioningRequest) {
    print_section("Provisioning summary");
    print_kv("Project", request.project_id());
    print_kv("Zone", request.zone());
    print_kv("Region", request.region());
    print_kv("Service account", request.service_account());
    print_kv("Disk size (GB)", &request.storage_size_gb().to_string());
    print_kv("VMs", &request.vm_names().join(", "));
    if let Some(subnet) = request.subnet() {
        print_kv("Subnet", &format!("{} ({})", subnet.name, subnet.range));
    }
    print_kv("Mode", &request.mode().to_string());
}
