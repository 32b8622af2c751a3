//! Engine-wide constants and defaults.

/// Host path prefixes that mark a template stand-in rather than a real location.
pub const DEFAULT_PLACEHOLDER_PREFIXES: &[&str] = &["/path/to/"];

/// Lowest valid port number.
pub const MIN_PORT: u16 = 1;

/// Prefix of the `network_mode` value that joins another service's namespace.
pub const CONTAINER_NETWORK_PREFIX: &str = "container:";

/// Default catalog file consulted by the CLI.
pub const DEFAULT_CATALOG_FILE: &str = "catalog/homelab.json";

/// Application name used in rendered summaries.
pub const APP_NAME: &str = "homelab";
