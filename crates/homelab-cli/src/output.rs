//! Output helpers shared by CLI commands.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use homelab_compose::report::ValidationReport;

/// Process exit status for a report: `1` when any finding blocks emission.
#[must_use]
pub fn exit_status(report: &ValidationReport) -> u8 {
    u8::from(report.has_errors())
}

/// Converts a report into the process exit code.
#[must_use]
pub fn exit_code(report: &ValidationReport) -> ExitCode {
    ExitCode::from(exit_status(report))
}

/// Writes the manifest to `path`, or to stdout when no path is given.
///
/// # Errors
///
/// Returns an error if the file or stdout cannot be written.
pub fn write_manifest(path: Option<&Path>, manifest: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, manifest)
                .with_context(|| format!("writing manifest to {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = manifest.len(), "manifest written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(manifest.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
