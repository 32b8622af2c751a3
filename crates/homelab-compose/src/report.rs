//! Validation findings and the report that accumulates them.

use std::fmt;

use homelab_common::types::Severity;
use serde::Serialize;

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Two services share a name.
    DuplicateName,
    /// Two bridge services publish the same host port.
    PortCollision,
    /// One host path is mounted into several services.
    PathCollision,
    /// A host path is still a template stand-in.
    UnresolvedPlaceholder,
    /// A port value is non-numeric or outside 1-65535.
    InvalidPort,
    /// A volume mapping has an empty host path or a relative container path.
    InvalidVolume,
    /// An override names a service absent from the catalog.
    OverrideTargetUnknown,
    /// `container:<ref>` names a service absent from the set.
    UnknownNetworkRef,
    /// A dependency hint names a service absent from the set.
    UnknownDependency,
    /// The default port is not among the published container ports.
    DefaultPortUnpublished,
    /// Ports are declared under a network mode that does not publish them.
    IgnoredPorts,
    /// Two host-network services listen on the same port.
    HostPortShared,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DuplicateName => "duplicate-name",
            Self::PortCollision => "port-collision",
            Self::PathCollision => "path-collision",
            Self::UnresolvedPlaceholder => "unresolved-placeholder",
            Self::InvalidPort => "invalid-port",
            Self::InvalidVolume => "invalid-volume",
            Self::OverrideTargetUnknown => "override-target-unknown",
            Self::UnknownNetworkRef => "unknown-network-ref",
            Self::UnknownDependency => "unknown-dependency",
            Self::DefaultPortUnpublished => "default-port-unpublished",
            Self::IgnoredPorts => "ignored-ports",
            Self::HostPortShared => "host-port-shared",
        };
        f.write_str(label)
    }
}

/// A single problem found in the resolved service set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Whether the finding blocks emission.
    pub severity: Severity,
    /// Category of the finding.
    pub kind: FindingKind,
    /// Service the finding is attributed to.
    pub service: String,
    /// Field the finding concerns.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl Finding {
    /// Creates an error finding.
    pub fn error(
        kind: FindingKind,
        service: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(Severity::Error, kind, service, field, message)
    }

    /// Creates a warning finding.
    pub fn warning(
        kind: FindingKind,
        service: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(Severity::Warning, kind, service, field, message)
    }

    /// Creates a finding with an explicit severity.
    pub fn with_severity(
        severity: Severity,
        kind: FindingKind,
        service: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            service: service.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} ({})",
            self.severity, self.service, self.field, self.message, self.kind
        )
    }
}

/// Ordered collection of findings from one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            findings: Vec::new(),
        }
    }

    /// Appends a finding.
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// All findings in the order they were raised.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Consumes the report, returning its findings.
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    /// Findings that block emission.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    /// Findings that do not block emission.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// Findings of one kind.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    /// Number of blocking findings.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of non-blocking findings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Whether emission is blocked.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Whether the report holds no findings at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl Extend<Finding> for ValidationReport {
    fn extend<I: IntoIterator<Item = Finding>>(&mut self, iter: I) {
        self.findings.extend(iter);
    }
}

impl FromIterator<Finding> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self {
            findings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_split_by_severity() {
        let report: ValidationReport = vec![
            Finding::error(FindingKind::PortCollision, "pi-hole", "ports", "host port 80"),
            Finding::warning(FindingKind::PathCollision, "radarr", "volumes", "shared"),
            Finding::warning(FindingKind::IgnoredPorts, "wg", "ports", "ignored"),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 2);
        assert!(report.has_errors());
        assert_eq!(report.of_kind(FindingKind::PathCollision).count(), 1);
    }

    #[test]
    fn empty_report_has_no_errors() {
        let report = ValidationReport::new();
        assert!(!report.has_errors());
        assert!(report.is_empty());
    }

    #[test]
    fn finding_display_is_single_line() {
        let finding = Finding::error(
            FindingKind::UnresolvedPlaceholder,
            "sonarr",
            "volumes",
            "host path /path/to/tv is a placeholder",
        );
        assert_eq!(
            finding.to_string(),
            "[error] sonarr volumes: host path /path/to/tv is a placeholder (unresolved-placeholder)"
        );
    }
}
