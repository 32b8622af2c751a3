//! Catalog loading.
//!
//! Converts raw structured records into typed [`ServiceDefinition`]s,
//! preserving catalog order. Any record that does not have the expected
//! shape aborts loading with [`HomelabError::MalformedCatalog`].

use std::collections::BTreeMap;
use std::path::Path;

use homelab_common::error::{HomelabError, Result};
use homelab_common::types::{NetworkMode, PortSpec, RestartPolicy};
use serde::Serialize;
use serde_json::{Map, Value};

const KNOWN_FIELDS: &[&str] = &[
    "name",
    "image",
    "default_port",
    "volumes",
    "environment",
    "network_mode",
    "ports",
    "restart_policy",
];

/// A host path mounted at a container path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMapping {
    /// Path on the host, possibly a placeholder.
    pub host: String,
    /// Absolute path inside the container.
    pub container: String,
}

/// A host port published to a container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    /// Port bound on the host.
    pub host: PortSpec,
    /// Port the service listens on inside the container.
    pub container: PortSpec,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    /// Unique lowercase identifier.
    pub name: String,
    /// Image reference, opaque to the engine.
    pub image: String,
    /// The service's natural listening port.
    pub default_port: Option<u16>,
    /// Volume mappings in authoring order.
    pub volumes: Vec<VolumeMapping>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Network attachment.
    pub network_mode: NetworkMode,
    /// Port mappings in authoring order.
    pub ports: Vec<PortMapping>,
    /// Restart behavior.
    pub restart_policy: RestartPolicy,
}

/// Parses catalog JSON text.
///
/// # Errors
///
/// Returns an error if the text is not JSON or any record is malformed.
pub fn parse_catalog(input: &str) -> Result<Vec<ServiceDefinition>> {
    let raw: Value = serde_json::from_str(input)?;
    load_catalog(&raw)
}

/// Reads and parses a catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its contents are malformed.
pub fn load_catalog_file(path: &Path) -> Result<Vec<ServiceDefinition>> {
    tracing::info!(path = %path.display(), "reading catalog");
    let content = std::fs::read_to_string(path).map_err(|source| HomelabError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&content)
}

/// Loads a sequence of raw records into typed service definitions.
///
/// # Errors
///
/// Returns [`HomelabError::MalformedCatalog`] citing the first offending
/// record and field.
pub fn load_catalog(raw: &Value) -> Result<Vec<ServiceDefinition>> {
    let records = raw.as_array().ok_or_else(|| HomelabError::Config {
        message: "catalog must be a sequence of service records".into(),
    })?;

    let services = records
        .iter()
        .enumerate()
        .map(|(index, record)| load_record(index, record))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(services = services.len(), "catalog loaded");
    Ok(services)
}

fn load_record(index: usize, record: &Value) -> Result<ServiceDefinition> {
    let fields = record
        .as_object()
        .ok_or_else(|| HomelabError::malformed(index, "<record>", "is not an object"))?;

    if let Some(unknown) = fields.keys().find(|k| !KNOWN_FIELDS.contains(&k.as_str())) {
        return Err(HomelabError::malformed(
            index,
            unknown,
            "is not a recognized field",
        ));
    }

    let name = required_string(index, fields, "name")?;
    if name.chars().any(|c| c.is_uppercase() || c.is_whitespace()) {
        return Err(HomelabError::malformed(
            index,
            "name",
            format!("\"{name}\" must be lowercase without whitespace"),
        ));
    }

    Ok(ServiceDefinition {
        image: required_string(index, fields, "image")?,
        default_port: load_default_port(index, fields)?,
        volumes: load_volumes(index, fields)?,
        environment: load_environment(index, fields)?,
        network_mode: load_enum(index, fields, "network_mode")?,
        ports: load_ports(index, fields)?,
        restart_policy: load_enum(index, fields, "restart_policy")?,
        name,
    })
}

fn required_string(index: usize, fields: &Map<String, Value>, field: &str) -> Result<String> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(HomelabError::malformed(index, field, "is missing")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(HomelabError::malformed(index, field, "is empty"))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(HomelabError::malformed(index, field, "must be a string")),
    }
}

fn load_default_port(index: usize, fields: &Map<String, Value>) -> Result<Option<u16>> {
    match fields.get("default_port") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .filter(|p| *p > 0)
            .map(Some)
            .ok_or_else(|| {
                HomelabError::malformed(index, "default_port", format!("{value} is not a port in 1-65535"))
            }),
    }
}

fn load_enum<T>(index: usize, fields: &Map<String, Value>, field: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match fields.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|reason: String| HomelabError::malformed(index, field, reason)),
        Some(_) => Err(HomelabError::malformed(index, field, "must be a string")),
    }
}

fn object_field<'a>(
    index: usize,
    fields: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(HomelabError::malformed(index, field, "must be a mapping")),
    }
}

/// Renders a scalar as text; numbers and booleans are accepted for convenience.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn load_volumes(index: usize, fields: &Map<String, Value>) -> Result<Vec<VolumeMapping>> {
    let Some(map) = object_field(index, fields, "volumes")? else {
        return Ok(Vec::new());
    };
    map.iter()
        .map(|(host, container)| {
            if host.trim().is_empty() {
                return Err(HomelabError::malformed(index, "volumes", "has an empty host path"));
            }
            let container = container.as_str().ok_or_else(|| {
                HomelabError::malformed(index, "volumes", format!("entry \"{host}\" must map to a string"))
            })?;
            if !container.starts_with('/') {
                return Err(HomelabError::malformed(
                    index,
                    "volumes",
                    format!("container path \"{container}\" is not absolute"),
                ));
            }
            Ok(VolumeMapping {
                host: host.clone(),
                container: container.to_string(),
            })
        })
        .collect()
}

fn load_environment(index: usize, fields: &Map<String, Value>) -> Result<BTreeMap<String, String>> {
    let Some(map) = object_field(index, fields, "environment")? else {
        return Ok(BTreeMap::new());
    };
    map.iter()
        .map(|(key, value)| {
            if key.trim().is_empty() {
                return Err(HomelabError::malformed(index, "environment", "has an empty variable name"));
            }
            let value = scalar_text(value).ok_or_else(|| {
                HomelabError::malformed(index, "environment", format!("value of {key} must be a scalar"))
            })?;
            Ok((key.clone(), value))
        })
        .collect()
}

fn load_ports(index: usize, fields: &Map<String, Value>) -> Result<Vec<PortMapping>> {
    let Some(map) = object_field(index, fields, "ports")? else {
        return Ok(Vec::new());
    };
    map.iter()
        .map(|(host, container)| {
            let host = PortSpec::new(host.as_str());
            if host.number().is_none() {
                return Err(HomelabError::malformed(
                    index,
                    "ports",
                    format!("host port \"{host}\" is not a number in 1-65535"),
                ));
            }
            let container = scalar_text(container)
                .map(PortSpec::new)
                .filter(|p| p.number().is_some())
                .ok_or_else(|| {
                    HomelabError::malformed(
                        index,
                        "ports",
                        format!("container port {container} for host port {host} is not a number in 1-65535"),
                    )
                })?;
            Ok(PortMapping { host, container })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record() -> Value {
        json!({
            "name": "sonarr",
            "image": "linuxserver/sonarr:latest",
            "default_port": 8989,
            "volumes": {
                "/path/to/config": "/config",
                "/path/to/tv": "/tv"
            },
            "environment": { "TZ": "America/Los_Angeles", "PUID": "1000" },
            "network_mode": "bridge",
            "ports": { "8989": "8989" },
            "restart_policy": "unless-stopped"
        })
    }

    fn expect_malformed(raw: &Value, field: &str) -> usize {
        match load_catalog(raw) {
            Err(HomelabError::MalformedCatalog { index, field: f, .. }) => {
                assert_eq!(f, field);
                index
            }
            other => panic!("expected malformed {field}, got {other:?}"),
        }
    }

    #[test]
    fn loads_complete_record() {
        let services = load_catalog(&json!([record()])).expect("should load");
        assert_eq!(services.len(), 1);
        let svc = &services[0];
        assert_eq!(svc.name, "sonarr");
        assert_eq!(svc.default_port, Some(8989));
        assert_eq!(svc.network_mode, NetworkMode::Bridge);
        assert_eq!(svc.restart_policy, RestartPolicy::UnlessStopped);
        assert_eq!(svc.ports[0].host.number(), Some(8989));
        assert_eq!(svc.environment.get("PUID").map(String::as_str), Some("1000"));
    }

    #[test]
    fn preserves_volume_authoring_order() {
        let services = load_catalog(&json!([record()])).expect("should load");
        let containers: Vec<&str> = services[0]
            .volumes
            .iter()
            .map(|v| v.container.as_str())
            .collect();
        assert_eq!(containers, vec!["/config", "/tv"]);
    }

    #[test]
    fn preserves_catalog_order() {
        let mut second = record();
        second["name"] = json!("radarr");
        let services = load_catalog(&json!([record(), second])).expect("should load");
        assert_eq!(services[0].name, "sonarr");
        assert_eq!(services[1].name, "radarr");
    }

    #[test]
    fn optional_fields_take_defaults() {
        let services = load_catalog(&json!([{ "name": "whoami", "image": "traefik/whoami" }]))
            .expect("should load");
        let svc = &services[0];
        assert_eq!(svc.network_mode, NetworkMode::Bridge);
        assert_eq!(svc.restart_policy, RestartPolicy::No);
        assert!(svc.ports.is_empty());
        assert!(svc.volumes.is_empty());
        assert_eq!(svc.default_port, None);
    }

    #[test]
    fn missing_name_cites_record_index() {
        let mut broken = record();
        let _ = broken.as_object_mut().expect("object").remove("name");
        let index = expect_malformed(&json!([record(), broken]), "name");
        assert_eq!(index, 1);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut broken = record();
        broken["name"] = json!("");
        let _ = expect_malformed(&json!([broken]), "name");
    }

    #[test]
    fn uppercase_name_is_rejected() {
        let mut broken = record();
        broken["name"] = json!("Sonarr");
        let _ = expect_malformed(&json!([broken]), "name");
    }

    #[test]
    fn non_numeric_port_key_is_rejected() {
        let mut broken = record();
        broken["ports"] = json!({ "http": "8989" });
        let _ = expect_malformed(&json!([broken]), "ports");
    }

    #[test]
    fn non_numeric_port_value_is_rejected() {
        let mut broken = record();
        broken["ports"] = json!({ "8989": "web" });
        let _ = expect_malformed(&json!([broken]), "ports");
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let mut broken = record();
        broken["ports"] = json!({ "70000": "80" });
        let _ = expect_malformed(&json!([broken]), "ports");
    }

    #[test]
    fn relative_container_path_is_rejected() {
        let mut broken = record();
        broken["volumes"] = json!({ "/srv/config": "config" });
        let _ = expect_malformed(&json!([broken]), "volumes");
    }

    #[test]
    fn unknown_network_mode_is_rejected() {
        let mut broken = record();
        broken["network_mode"] = json!("overlay");
        let _ = expect_malformed(&json!([broken]), "network_mode");
    }

    #[test]
    fn unknown_restart_policy_is_rejected() {
        let mut broken = record();
        broken["restart_policy"] = json!("sometimes");
        let _ = expect_malformed(&json!([broken]), "restart_policy");
    }

    #[test]
    fn unrecognized_field_is_rejected() {
        let mut broken = record();
        broken["labels"] = json!({});
        let _ = expect_malformed(&json!([broken]), "labels");
    }

    #[test]
    fn non_array_catalog_is_rejected() {
        let result = load_catalog(&json!({ "name": "sonarr" }));
        assert!(matches!(result, Err(HomelabError::Config { .. })));
    }

    #[test]
    fn load_catalog_file_reads_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, json!([record()]).to_string()).expect("write");
        let services = load_catalog_file(&path).expect("should load");
        assert_eq!(services[0].image, "linuxserver/sonarr:latest");
    }

    #[test]
    fn load_catalog_file_reports_missing_path() {
        let result = load_catalog_file(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(HomelabError::Io { .. })));
    }
}
