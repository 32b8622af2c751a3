//! Host-specific override resolution.
//!
//! Merges an [`OverrideSet`] onto catalog defaults. The resolver only
//! substitutes values: it does not judge whether the result is sound,
//! which is the validator's job.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use homelab_common::error::{HomelabError, Result};
use homelab_common::types::{NetworkMode, PortSpec, RestartPolicy};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{PortMapping, ServiceDefinition, VolumeMapping};
use crate::report::{Finding, FindingKind};

/// Overrides keyed by service name.
pub type OverrideSet = BTreeMap<String, Override>;

/// Partial replacement for one catalog entry.
///
/// Every field is optional; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Override {
    /// Replacement image reference.
    #[serde(deserialize_with = "non_empty")]
    pub image: Option<String>,
    /// Replacement default port.
    #[serde(deserialize_with = "non_empty_port")]
    pub default_port: Option<u16>,
    /// Replacement network mode.
    #[serde(deserialize_with = "non_empty")]
    pub network_mode: Option<NetworkMode>,
    /// Replacement restart policy.
    #[serde(deserialize_with = "non_empty")]
    pub restart_policy: Option<RestartPolicy>,
    /// Host path to container path; replaces the host side of the matching container path.
    #[serde(deserialize_with = "ordered_pairs")]
    pub volumes: Vec<(String, String)>,
    /// Host port to container port; replaces the host side of the matching container port.
    #[serde(deserialize_with = "ordered_pairs")]
    pub ports: Vec<(String, String)>,
    /// Variables merged key by key over the catalog environment.
    #[serde(deserialize_with = "ordered_pairs")]
    pub environment: Vec<(String, String)>,
}

/// A catalog entry with overrides applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedService {
    /// Position in the catalog; the tie-break key for every ordering downstream.
    pub catalog_index: usize,
    /// Service name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Natural listening port.
    pub default_port: Option<u16>,
    /// Volume mappings.
    pub volumes: Vec<VolumeMapping>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Network attachment.
    pub network_mode: NetworkMode,
    /// Port mappings.
    pub ports: Vec<PortMapping>,
    /// Restart behavior.
    pub restart_policy: RestartPolicy,
}

impl ResolvedService {
    /// Wraps a catalog entry without any override.
    #[must_use]
    pub fn from_definition(catalog_index: usize, def: &ServiceDefinition) -> Self {
        Self {
            catalog_index,
            name: def.name.clone(),
            image: def.image.clone(),
            default_port: def.default_port,
            volumes: def.volumes.clone(),
            environment: def.environment.clone(),
            network_mode: def.network_mode.clone(),
            ports: def.ports.clone(),
            restart_policy: def.restart_policy,
        }
    }
}

/// Output of override resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved services in catalog order.
    pub services: Vec<ResolvedService>,
    /// Warnings raised while resolving.
    pub findings: Vec<Finding>,
}

/// Parses an override set from JSON text.
///
/// # Errors
///
/// Returns an error if the text is not a mapping of service name to override record.
pub fn parse_overrides(input: &str) -> Result<OverrideSet> {
    Ok(serde_json::from_str(input)?)
}

/// Reads and parses an override file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_overrides_file(path: &Path) -> Result<OverrideSet> {
    tracing::info!(path = %path.display(), "reading overrides");
    let content = std::fs::read_to_string(path).map_err(|source| HomelabError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_overrides(&content)
}

/// Applies `overrides` to `catalog`, producing resolved services in catalog order.
///
/// Override targets absent from the catalog yield one warning each and are
/// otherwise ignored.
pub fn resolve(catalog: &[ServiceDefinition], overrides: &OverrideSet) -> Resolution {
    tracing::info!(
        services = catalog.len(),
        overrides = overrides.len(),
        "resolving overrides"
    );

    let findings = overrides
        .keys()
        .filter(|name| !catalog.iter().any(|def| &def.name == *name))
        .map(|name| {
            tracing::warn!(service = %name, "override targets unknown service");
            Finding::warning(
                FindingKind::OverrideTargetUnknown,
                name.as_str(),
                "override",
                format!("no catalog entry named \"{name}\"; override ignored"),
            )
        })
        .collect();

    let services = catalog
        .iter()
        .enumerate()
        .map(|(index, def)| {
            let base = ResolvedService::from_definition(index, def);
            match overrides.get(&def.name) {
                Some(ov) => apply_override(base, ov),
                None => base,
            }
        })
        .collect();

    Resolution { services, findings }
}

fn apply_override(mut svc: ResolvedService, ov: &Override) -> ResolvedService {
    tracing::debug!(service = %svc.name, "applying override");

    if let Some(image) = &ov.image {
        svc.image.clone_from(image);
    }
    if let Some(port) = ov.default_port {
        svc.default_port = Some(port);
    }
    if let Some(mode) = &ov.network_mode {
        svc.network_mode = mode.clone();
    }
    if let Some(policy) = ov.restart_policy {
        svc.restart_policy = policy;
    }

    for (host, container) in &ov.volumes {
        if host.is_empty() {
            continue;
        }
        match svc.volumes.iter_mut().find(|v| &v.container == container) {
            Some(existing) => existing.host.clone_from(host),
            None => svc.volumes.push(VolumeMapping {
                host: host.clone(),
                container: container.clone(),
            }),
        }
    }

    for (host, container) in &ov.ports {
        if host.is_empty() {
            continue;
        }
        let wanted = PortSpec::new(container.as_str());
        match svc
            .ports
            .iter_mut()
            .find(|p| same_port(&p.container, &wanted))
        {
            Some(existing) => existing.host = PortSpec::new(host.as_str()),
            None => svc.ports.push(PortMapping {
                host: PortSpec::new(host.as_str()),
                container: PortSpec::new(container.as_str()),
            }),
        }
    }

    for (key, value) in &ov.environment {
        let _ = svc.environment.insert(key.clone(), value.clone());
    }

    svc
}

/// Compares numerically when both sides parse, textually otherwise.
fn same_port(a: &PortSpec, b: &PortSpec) -> bool {
    match (a.number(), b.number()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Deserializes an optional port given as a number or a string, treating `""` as absent.
fn non_empty_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)?.map(String::from) {
        Some(text) if !text.trim().is_empty() => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                de::Error::custom(format!("default_port \"{text}\" is not a port number"))
            }),
        _ => Ok(None),
    }
}

/// Deserializes an optional value, treating `""` as absent.
fn non_empty<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.trim().is_empty() => text.parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

/// Scalar accepted on either side of a mapping entry.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Deserializes a mapping into ordered `(key, value)` pairs.
fn ordered_pairs<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of strings")
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::new();
            while let Some((key, value)) = access.next_entry::<String, Scalar>()? {
                pairs.push((key, String::from(value)));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_any(PairsVisitor)
}
