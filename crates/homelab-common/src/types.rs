//! Domain primitive types used across the homelab workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{CONTAINER_NETWORK_PREFIX, MIN_PORT};

/// Network attachment of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkMode {
    /// Default isolated bridge network with published ports.
    #[default]
    Bridge,
    /// Shares the host's network stack; published ports are meaningless.
    Host,
    /// No networking at all.
    None,
    /// Joins the network namespace of another service.
    Container(String),
}

impl NetworkMode {
    /// Whether host ports declared by this service are actually published.
    #[must_use]
    pub const fn publishes_ports(&self) -> bool {
        matches!(self, Self::Bridge)
    }

    /// Name of the service whose namespace this mode joins, if any.
    #[must_use]
    pub fn container_ref(&self) -> Option<&str> {
        match self {
            Self::Container(name) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(Self::Bridge),
            "host" => Ok(Self::Host),
            "none" => Ok(Self::None),
            other => match other.strip_prefix(CONTAINER_NETWORK_PREFIX) {
                Some(target) if !target.trim().is_empty() => {
                    Ok(Self::Container(target.to_string()))
                }
                Some(_) => Err("container network mode requires a service reference".into()),
                None => Err(format!(
                    "\"{other}\" is not one of bridge, host, none, container:<ref>"
                )),
            },
        }
    }
}

impl TryFrom<String> for NetworkMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkMode> for String {
    fn from(mode: NetworkMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge => write!(f, "bridge"),
            Self::Host => write!(f, "host"),
            Self::None => write!(f, "none"),
            Self::Container(target) => write!(f, "{CONTAINER_NETWORK_PREFIX}{target}"),
        }
    }
}

/// Restart behavior applied by the container runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RestartPolicy {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart only after a non-zero exit.
    OnFailure,
    /// Restart unless explicitly stopped.
    UnlessStopped,
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "always" => Ok(Self::Always),
            "on-failure" => Ok(Self::OnFailure),
            "unless-stopped" => Ok(Self::UnlessStopped),
            other => Err(format!(
                "\"{other}\" is not one of no, always, on-failure, unless-stopped"
            )),
        }
    }
}

impl TryFrom<String> for RestartPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RestartPolicy> for String {
    fn from(policy: RestartPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::No => write!(f, "no"),
            Self::Always => write!(f, "always"),
            Self::OnFailure => write!(f, "on-failure"),
            Self::UnlessStopped => write!(f, "unless-stopped"),
        }
    }
}

/// A port value exactly as written in the catalog or an override.
///
/// Kept string-typed so a bad value injected by an override survives
/// resolution and is reported by validation instead of being lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSpec(String);

impl PortSpec {
    /// Creates a port spec from its textual form.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the port number if the value is a decimal integer in 1..=65535.
    #[must_use]
    pub fn number(&self) -> Option<u16> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse::<u16>().ok().filter(|p| *p >= MIN_PORT)
    }

    /// Returns the raw textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u16> for PortSpec {
    fn from(port: u16) -> Self {
        Self(port.to_string())
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks manifest emission.
    Error,
    /// Surfaced to the caller; emission proceeds.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}
