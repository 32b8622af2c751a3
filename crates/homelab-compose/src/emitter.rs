//! Manifest emission.
//!
//! Builds a [`Manifest`] in plan order and hands it to a
//! [`ManifestRenderer`]. Field order is fixed by the struct layout and
//! environment keys are sorted, so identical input renders to identical bytes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use homelab_common::config::{EngineConfig, ManifestFormat};
use homelab_common::constants::APP_NAME;
use homelab_common::error::{HomelabError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::overrides::ResolvedService;
use crate::planner::DependencyPlan;
use crate::report::ValidationReport;

/// One service as it appears in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestService {
    /// Service name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Published ports as `host:container`.
    pub ports: Vec<String>,
    /// Volume mounts as `host:container`.
    pub volumes: Vec<String>,
    /// Environment variables, sorted by name.
    pub environment: BTreeMap<String, String>,
    /// Network mode.
    pub network_mode: String,
    /// Restart policy.
    pub restart: String,
    /// Services that must start first.
    pub start_after: Vec<String>,
}

/// The orchestration description for the whole stack, in startup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Optional project name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Services in plan order.
    pub services: Vec<ManifestService>,
}

/// Assembles the manifest from a plan and the resolved services it covers.
///
/// # Errors
///
/// Returns an error if the plan references a service missing from `services`.
pub fn build_manifest(
    plan: &DependencyPlan,
    services: &[ResolvedService],
    config: &EngineConfig,
) -> Result<Manifest> {
    let services = plan
        .services
        .iter()
        .map(|planned| {
            let svc = services
                .iter()
                .find(|s| s.catalog_index == planned.catalog_index)
                .ok_or_else(|| HomelabError::Render {
                    message: format!("plan references unknown service \"{}\"", planned.name),
                })?;
            Ok(ManifestService {
                name: svc.name.clone(),
                image: svc.image.clone(),
                // Runtimes reject published ports outside bridge mode.
                ports: if svc.network_mode.publishes_ports() {
                    svc.ports
                        .iter()
                        .map(|p| format!("{}:{}", p.host, p.container))
                        .collect()
                } else {
                    Vec::new()
                },
                volumes: svc
                    .volumes
                    .iter()
                    .map(|v| format!("{}:{}", v.host, v.container))
                    .collect(),
                environment: svc.environment.clone(),
                network_mode: svc.network_mode.to_string(),
                restart: svc.restart_policy.to_string(),
                start_after: planned.start_after.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Manifest {
        name: config.project_name.clone(),
        services,
    })
}

/// Output adapter turning a manifest into text.
pub trait ManifestRenderer {
    /// Renders the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    fn render(&self, manifest: &Manifest) -> Result<String>;
}

/// Returns the renderer for the configured format.
#[must_use]
pub fn renderer_for(format: ManifestFormat) -> Box<dyn ManifestRenderer> {
    match format {
        ManifestFormat::Compose => Box::new(ComposeRenderer),
        ManifestFormat::Json => Box::new(JsonRenderer),
    }
}

/// Renders compose-file YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeRenderer;

/// Renders the manifest structure as pretty JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct ComposeFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    services: ComposeServices<'a>,
}

/// Serializes as a mapping keyed by service name, in plan order.
struct ComposeServices<'a>(&'a [ManifestService]);

impl Serialize for ComposeServices<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for svc in self.0 {
            map.serialize_entry(&svc.name, &ComposeService::from(svc))?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ComposeService<'a> {
    image: &'a str,
    container_name: &'a str,
    network_mode: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,
    restart: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

impl<'a> From<&'a ManifestService> for ComposeService<'a> {
    fn from(svc: &'a ManifestService) -> Self {
        Self {
            image: &svc.image,
            container_name: &svc.name,
            network_mode: &svc.network_mode,
            ports: svc.ports.clone(),
            volumes: svc.volumes.clone(),
            environment: svc.environment.clone(),
            restart: &svc.restart,
            depends_on: svc.start_after.clone(),
        }
    }
}

impl ManifestRenderer for ComposeRenderer {
    fn render(&self, manifest: &Manifest) -> Result<String> {
        let file = ComposeFile {
            name: manifest.name.as_deref(),
            services: ComposeServices(&manifest.services),
        };
        let yaml = serde_yaml::to_string(&file).map_err(|e| HomelabError::Render {
            message: e.to_string(),
        })?;
        Ok(quote_ambiguous_scalars(&yaml))
    }
}

/// Double-quotes `restart` values and `ports` items, which YAML 1.1 readers
/// would otherwise take as booleans (`no`) or base-60 integers (`80:80`).
fn quote_ambiguous_scalars(yaml: &str) -> String {
    let mut out = String::with_capacity(yaml.len());
    let mut ports_indent: Option<usize> = None;

    for line in yaml.lines() {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim_start();

        if let Some(key_indent) = ports_indent {
            match trimmed.strip_prefix("- ") {
                Some(item) if indent >= key_indent => {
                    out.push_str(&line[..indent]);
                    out.push_str("- ");
                    out.push_str(&quoted(item));
                    out.push('\n');
                    continue;
                }
                _ => ports_indent = None,
            }
        }

        if trimmed == "ports:" {
            ports_indent = Some(indent);
        } else if let Some(value) = trimmed.strip_prefix("restart: ") {
            out.push_str(&line[..indent]);
            out.push_str("restart: ");
            out.push_str(&quoted(value));
            out.push('\n');
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn quoted(scalar: &str) -> String {
    if scalar.starts_with('\'') || scalar.starts_with('"') {
        scalar.to_string()
    } else {
        format!("\"{}\"", scalar.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl ManifestRenderer for JsonRenderer {
    fn render(&self, manifest: &Manifest) -> Result<String> {
        let mut text = serde_json::to_string_pretty(manifest)?;
        text.push('\n');
        Ok(text)
    }
}

/// Renders a human-readable summary of the findings and, when available, the plan.
#[must_use]
pub fn render_summary(report: &ValidationReport, plan: Option<&DependencyPlan>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{APP_NAME} validation report");
    let _ = writeln!(
        out,
        "  {} error(s), {} warning(s)",
        report.error_count(),
        report.warning_count()
    );

    if !report.is_empty() {
        let _ = writeln!(out);
        for finding in report.findings() {
            let _ = writeln!(out, "  {finding}");
        }
    }

    if let Some(plan) = plan {
        let _ = writeln!(out);
        let _ = writeln!(out, "Startup order:");
        for (tier, names) in plan.tiers().iter().enumerate() {
            let _ = writeln!(out, "  tier {tier}: {}", names.join(", "));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "  {} service(s) will be emitted.", plan.services.len());
    } else if report.has_errors() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Manifest not emitted: resolve the errors above.");
    }

    out
}
