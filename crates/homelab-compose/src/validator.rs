//! Conflict validation over the resolved service set.
//!
//! Every check runs on every call; none short-circuits. Findings are
//! appended in check order and, within a check, in catalog order, so the
//! same input always yields the same report.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use homelab_common::config::EngineConfig;
use homelab_common::types::NetworkMode;

use crate::overrides::ResolvedService;
use crate::report::{Finding, FindingKind, ValidationReport};

/// Validates resolved services and returns every finding.
///
/// # Checks performed
///
/// 1. Duplicate service names.
/// 2. Port values that are non-numeric or out of range.
/// 3. Volume mappings with empty host paths or relative container paths.
/// 4. Host paths still matching a placeholder prefix.
/// 5. `container:<ref>` network modes naming an unknown service.
/// 6. Host ports published by more than one bridge service.
/// 7. Ports declared under a mode that does not publish them.
/// 8. Host-network services sharing a listening port.
/// 9. Default ports that are not published.
/// 10. Host paths mounted into more than one service.
pub fn validate(services: &[ResolvedService], config: &EngineConfig) -> ValidationReport {
    tracing::info!(services = services.len(), "validating resolved services");

    let mut report = ValidationReport::new();
    check_duplicate_names(services, &mut report);
    check_port_values(services, &mut report);
    check_volume_shapes(services, &mut report);
    check_placeholders(services, config, &mut report);
    check_network_refs(services, &mut report);
    check_port_collisions(services, &mut report);
    check_ignored_ports(services, &mut report);
    check_host_mode_ports(services, &mut report);
    check_default_port_published(services, &mut report);
    check_path_collisions(services, config, &mut report);

    tracing::info!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validation finished"
    );
    report
}

fn check_duplicate_names(services: &[ResolvedService], report: &mut ValidationReport) {
    for (j, later) in services.iter().enumerate() {
        for earlier in services[..j].iter().filter(|s| s.name == later.name) {
            report.push(Finding::error(
                FindingKind::DuplicateName,
                later.name.as_str(),
                "name",
                format!(
                    "service name \"{}\" is declared at catalog indices {} and {}",
                    later.name, earlier.catalog_index, later.catalog_index
                ),
            ));
        }
    }
}

fn check_port_values(services: &[ResolvedService], report: &mut ValidationReport) {
    for svc in services {
        if svc.default_port == Some(0) {
            report.push(Finding::error(
                FindingKind::InvalidPort,
                svc.name.as_str(),
                "default_port",
                "default port 0 is not a number in 1-65535",
            ));
        }
        for mapping in &svc.ports {
            for (side, spec) in [("host", &mapping.host), ("container", &mapping.container)] {
                if spec.number().is_none() {
                    report.push(Finding::error(
                        FindingKind::InvalidPort,
                        svc.name.as_str(),
                        "ports",
                        format!("{side} port \"{spec}\" is not a number in 1-65535"),
                    ));
                }
            }
        }
    }
}

fn check_volume_shapes(services: &[ResolvedService], report: &mut ValidationReport) {
    for svc in services {
        for volume in &svc.volumes {
            if volume.host.trim().is_empty() {
                report.push(Finding::error(
                    FindingKind::InvalidVolume,
                    svc.name.as_str(),
                    "volumes",
                    format!("mapping to {} has an empty host path", volume.container),
                ));
            }
            if !volume.container.starts_with('/') {
                report.push(Finding::error(
                    FindingKind::InvalidVolume,
                    svc.name.as_str(),
                    "volumes",
                    format!("container path \"{}\" is not absolute", volume.container),
                ));
            }
        }
    }
}

fn check_placeholders(
    services: &[ResolvedService],
    config: &EngineConfig,
    report: &mut ValidationReport,
) {
    for svc in services {
        for volume in svc.volumes.iter().filter(|v| config.is_placeholder(&v.host)) {
            report.push(Finding::with_severity(
                config.placeholder_severity,
                FindingKind::UnresolvedPlaceholder,
                svc.name.as_str(),
                "volumes",
                format!(
                    "host path {} for {} is a placeholder; override it with a real location",
                    volume.host, volume.container
                ),
            ));
        }
    }
}

fn check_network_refs(services: &[ResolvedService], report: &mut ValidationReport) {
    for svc in services {
        let Some(target) = svc.network_mode.container_ref() else {
            continue;
        };
        if target == svc.name {
            report.push(Finding::error(
                FindingKind::UnknownNetworkRef,
                svc.name.as_str(),
                "network_mode",
                "service cannot join its own network namespace",
            ));
        } else if !services.iter().any(|s| s.name == target) {
            report.push(Finding::error(
                FindingKind::UnknownNetworkRef,
                svc.name.as_str(),
                "network_mode",
                format!("network_mode references unknown service \"{target}\""),
            ));
        }
    }
}

fn check_port_collisions(services: &[ResolvedService], report: &mut ValidationReport) {
    let mut claims: BTreeMap<u16, Vec<&ResolvedService>> = BTreeMap::new();

    for svc in services.iter().filter(|s| s.network_mode.publishes_ports()) {
        let mut own = BTreeSet::new();
        for port in svc.ports.iter().filter_map(|p| p.host.number()) {
            if !own.insert(port) {
                report.push(Finding::error(
                    FindingKind::PortCollision,
                    svc.name.as_str(),
                    "ports",
                    format!("host port {port} is mapped more than once"),
                ));
                continue;
            }
            let owners = claims.entry(port).or_default();
            for earlier in owners.iter() {
                report.push(Finding::error(
                    FindingKind::PortCollision,
                    svc.name.as_str(),
                    "ports",
                    format!(
                        "host port {port} is published by both \"{}\" and \"{}\"",
                        earlier.name, svc.name
                    ),
                ));
            }
            owners.push(svc);
        }
    }
}

fn check_ignored_ports(services: &[ResolvedService], report: &mut ValidationReport) {
    for svc in services {
        if svc.ports.is_empty() || svc.network_mode.publishes_ports() {
            continue;
        }
        report.push(Finding::warning(
            FindingKind::IgnoredPorts,
            svc.name.as_str(),
            "ports",
            format!(
                "{} port mapping(s) are ignored under network_mode {}",
                svc.ports.len(),
                svc.network_mode
            ),
        ));
    }
}

/// Ports a host-network service is assumed to bind directly on the host.
fn effective_host_ports(svc: &ResolvedService) -> BTreeSet<u16> {
    svc.default_port
        .into_iter()
        .chain(svc.ports.iter().filter_map(|p| p.container.number()))
        .collect()
}

fn check_host_mode_ports(services: &[ResolvedService], report: &mut ValidationReport) {
    let mut claims: HashMap<u16, Vec<&str>> = HashMap::new();

    for svc in services
        .iter()
        .filter(|s| s.network_mode == NetworkMode::Host)
    {
        for port in effective_host_ports(svc) {
            let owners = claims.entry(port).or_default();
            for earlier in owners.iter() {
                report.push(Finding::warning(
                    FindingKind::HostPortShared,
                    svc.name.as_str(),
                    "network_mode",
                    format!(
                        "host-network services \"{earlier}\" and \"{}\" both appear to listen on port {port}",
                        svc.name
                    ),
                ));
            }
            owners.push(svc.name.as_str());
        }
    }
}

fn check_default_port_published(services: &[ResolvedService], report: &mut ValidationReport) {
    for svc in services.iter().filter(|s| s.network_mode.publishes_ports()) {
        let Some(default_port) = svc.default_port.filter(|p| *p > 0) else {
            continue;
        };
        let published = svc
            .ports
            .iter()
            .any(|p| p.container.number() == Some(default_port));
        if !published {
            report.push(Finding::warning(
                FindingKind::DefaultPortUnpublished,
                svc.name.as_str(),
                "default_port",
                format!("default port {default_port} is not among the published container ports"),
            ));
        }
    }
}

fn check_path_collisions(
    services: &[ResolvedService],
    config: &EngineConfig,
    report: &mut ValidationReport,
) {
    let mut claims: HashMap<&str, Vec<&str>> = HashMap::new();

    for svc in services {
        let own: BTreeSet<&str> = svc
            .volumes
            .iter()
            .map(|v| v.host.as_str())
            .filter(|host| !host.trim().is_empty() && !config.is_placeholder(host))
            .collect();
        for host in own {
            let owners = claims.entry(host).or_default();
            for earlier in owners.iter().filter(|name| **name != svc.name) {
                report.push(Finding::warning(
                    FindingKind::PathCollision,
                    svc.name.as_str(),
                    "volumes",
                    format!(
                        "host path {host} is also mounted by \"{earlier}\"; shared data directories are usually a copy-paste mistake"
                    ),
                ));
            }
            owners.push(svc.name.as_str());
        }
    }
}
