//! End-to-end pipeline: load, resolve, validate, plan, emit.
//!
//! A run yields exactly one of three results: an emitted manifest with a
//! warnings-only report, a rejected run carrying the blocking report, or a
//! single structural error (malformed catalog or dependency cycle).

use homelab_common::config::EngineConfig;
use homelab_common::error::Result;
use serde_json::Value;

use crate::catalog::{ServiceDefinition, load_catalog};
use crate::emitter::{build_manifest, render_summary, renderer_for};
use crate::overrides::{OverrideSet, resolve};
use crate::planner::{
    DependencyHints, DependencyPlan, plan, unknown_hint_dependents, unknown_hint_targets,
};
use crate::report::{Finding, FindingKind, ValidationReport};
use crate::validator::validate;

/// Result of a run that got past loading and planning.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Validation passed; the manifest was rendered.
    Emitted {
        /// Rendered manifest text.
        manifest: String,
        /// Human-readable summary of findings and startup order.
        summary: String,
        /// Findings, all warnings.
        report: ValidationReport,
        /// Startup plan the manifest follows.
        plan: DependencyPlan,
    },
    /// Validation found blocking errors; nothing was emitted.
    Rejected {
        /// Human-readable summary of findings.
        summary: String,
        /// Findings, including at least one error.
        report: ValidationReport,
    },
}

impl Outcome {
    /// The validation report for this run.
    #[must_use]
    pub const fn report(&self) -> &ValidationReport {
        match self {
            Self::Emitted { report, .. } | Self::Rejected { report, .. } => report,
        }
    }

    /// The rendered summary for this run.
    #[must_use]
    pub fn summary(&self) -> &str {
        match self {
            Self::Emitted { summary, .. } | Self::Rejected { summary, .. } => summary,
        }
    }

    /// The manifest, if one was emitted.
    #[must_use]
    pub fn manifest(&self) -> Option<&str> {
        match self {
            Self::Emitted { manifest, .. } => Some(manifest),
            Self::Rejected { .. } => None,
        }
    }
}

/// Runs the pipeline over raw catalog records.
///
/// # Errors
///
/// Returns an error if the catalog is malformed, the dependencies form a
/// cycle, or the manifest cannot be rendered.
pub fn run_raw(
    raw: &Value,
    overrides: &OverrideSet,
    hints: &DependencyHints,
    config: &EngineConfig,
) -> Result<Outcome> {
    let catalog = load_catalog(raw)?;
    run(&catalog, overrides, hints, config)
}

/// Runs the pipeline over a loaded catalog.
///
/// # Errors
///
/// Returns an error if the dependencies form a cycle or the manifest cannot
/// be rendered. Validation problems are returned as [`Outcome::Rejected`].
pub fn run(
    catalog: &[ServiceDefinition],
    overrides: &OverrideSet,
    hints: &DependencyHints,
    config: &EngineConfig,
) -> Result<Outcome> {
    let resolution = resolve(catalog, overrides);

    let mut report: ValidationReport = resolution.findings.into_iter().collect();
    report.extend(validate(&resolution.services, config).into_findings());
    report.extend(
        unknown_hint_dependents(&resolution.services, hints)
            .into_iter()
            .map(|dependent| {
                Finding::warning(
                    FindingKind::UnknownDependency,
                    dependent,
                    "depends_on",
                    format!(
                        "no catalog entry named \"{dependent}\"; its dependencies are ignored"
                    ),
                )
            }),
    );
    report.extend(
        unknown_hint_targets(&resolution.services, hints)
            .into_iter()
            .map(|(dependent, target)| {
                Finding::warning(
                    FindingKind::UnknownDependency,
                    dependent,
                    "depends_on",
                    format!("dependency \"{target}\" is not in the catalog; ignored"),
                )
            }),
    );

    if report.has_errors() {
        tracing::warn!(errors = report.error_count(), "emission blocked by validation errors");
        return Ok(Outcome::Rejected {
            summary: render_summary(&report, None),
            report,
        });
    }

    let plan = plan(&resolution.services, hints)?;
    let manifest = build_manifest(&plan, &resolution.services, config)?;
    let manifest = renderer_for(config.format).render(&manifest)?;

    tracing::info!(
        services = plan.services.len(),
        warnings = report.warning_count(),
        "manifest emitted"
    );
    Ok(Outcome::Emitted {
        manifest,
        summary: render_summary(&report, Some(&plan)),
        report,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use homelab_common::error::HomelabError;
    use serde_json::json;

    use super::*;
    use crate::overrides::parse_overrides;

    fn raw() -> Value {
        json!([
            {
                "name": "gitea",
                "image": "gitea/gitea:latest",
                "default_port": 3000,
                "volumes": { "/srv/gitea": "/data" },
                "ports": { "3000": "3000" },
                "restart_policy": "unless-stopped"
            },
            {
                "name": "bookstack",
                "image": "linuxserver/bookstack:latest",
                "default_port": 6875,
                "volumes": { "/path/to/config": "/config" },
                "ports": { "6875": "6875" },
                "restart_policy": "unless-stopped"
            }
        ])
    }

    #[test]
    fn placeholder_blocks_emission() {
        let outcome = run_raw(
            &raw(),
            &OverrideSet::new(),
            &DependencyHints::new(),
            &EngineConfig::default(),
        )
        .expect("should run");
        assert!(outcome.manifest().is_none());
        assert_eq!(outcome.report().error_count(), 1);
        assert!(outcome.summary().contains("Manifest not emitted"));
    }

    #[test]
    fn override_unblocks_emission() {
        let overrides =
            parse_overrides(r#"{ "bookstack": { "volumes": { "/srv/bookstack": "/config" } } }"#)
                .expect("overrides");
        let outcome = run_raw(&raw(), &overrides, &DependencyHints::new(), &EngineConfig::default())
            .expect("should run");
        let manifest = outcome.manifest().expect("manifest emitted");
        assert!(manifest.contains("/srv/bookstack:/config"));
        assert!(outcome.report().is_empty());
    }

    #[test]
    fn unknown_dependency_warns_but_emits() {
        let overrides =
            parse_overrides(r#"{ "bookstack": { "volumes": { "/srv/bookstack": "/config" } } }"#)
                .expect("overrides");
        let mut hints = DependencyHints::new();
        let _ = hints
            .entry("bookstack".into())
            .or_default()
            .insert("mariadb".into());
        let outcome = run_raw(&raw(), &overrides, &hints, &EngineConfig::default())
            .expect("should run");
        assert!(outcome.manifest().is_some());
        let found: Vec<_> = outcome
            .report()
            .of_kind(FindingKind::UnknownDependency)
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].service, "bookstack");
    }

    #[test]
    fn unknown_hint_dependent_warns_but_emits() {
        let overrides =
            parse_overrides(r#"{ "bookstack": { "volumes": { "/srv/bookstack": "/config" } } }"#)
                .expect("overrides");
        let mut hints = DependencyHints::new();
        let _ = hints
            .entry("bokstack".into())
            .or_default()
            .insert("gitea".into());
        let outcome = run_raw(&raw(), &overrides, &hints, &EngineConfig::default())
            .expect("should run");
        let Outcome::Emitted { report, plan, .. } = outcome else {
            panic!("should emit");
        };
        assert_eq!(plan.order(), vec!["gitea", "bookstack"]);
        let found: Vec<_> = report.of_kind(FindingKind::UnknownDependency).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].service, "bokstack");
        assert!(found[0].message.contains("ignored"));
    }

    #[test]
    fn default_port_zero_blocks_emission() {
        let overrides = parse_overrides(
            r#"{ "bookstack": { "default_port": 0, "volumes": { "/srv/bookstack": "/config" } } }"#,
        )
        .expect("overrides");
        let outcome = run_raw(&raw(), &overrides, &DependencyHints::new(), &EngineConfig::default())
            .expect("should run");
        assert!(outcome.manifest().is_none());
        assert_eq!(
            outcome.report().of_kind(FindingKind::InvalidPort).count(),
            1
        );
    }

    #[test]
    fn container_mode_service_emits_without_ports() {
        let catalog = json!([
            {
                "name": "gluetun",
                "image": "qmcgaw/gluetun",
                "volumes": { "/srv/gluetun": "/gluetun" },
                "ports": { "9090": "8080" }
            },
            {
                "name": "qbittorrent",
                "image": "linuxserver/qbittorrent:latest",
                "network_mode": "container:gluetun",
                "ports": { "9091": "8080" }
            }
        ]);
        let outcome = run_raw(
            &catalog,
            &OverrideSet::new(),
            &DependencyHints::new(),
            &EngineConfig::default(),
        )
        .expect("should run");
        let manifest = outcome.manifest().expect("manifest emitted");
        assert!(manifest.contains("container:gluetun"), "got:\n{manifest}");
        assert!(!manifest.contains("9091"), "got:\n{manifest}");
        assert_eq!(outcome.report().of_kind(FindingKind::IgnoredPorts).count(), 1);
    }

    #[test]
    fn malformed_catalog_is_a_structural_error() {
        let result = run_raw(
            &json!([{ "image": "nameless" }]),
            &OverrideSet::new(),
            &DependencyHints::new(),
            &EngineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(HomelabError::MalformedCatalog { index: 0, .. })
        ));
    }
}
