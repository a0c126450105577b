//! Target runner - makes each target of a patch set engine-compatible
//!
//! For every target this:
//! - Honors `enabled` and the package version gate
//! - Applies the exact substitution table, then the general transformer
//! - Writes the result atomically, or only reports in check mode
//! - Points at the closest candidate when unsupported syntax survives

use crate::config::schema::{PatchSet, TargetDefinition};
use crate::config::version::{matches_requirement, package_version, VersionError};
use crate::detect::{unsupported_offsets, ConstructCounts};
use crate::edit::{EditError, Rewrite, RewriteResult};
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::substitute::apply_substitutions;
use crate::transform::Transformer;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Cap on unsupported-construct sites compared against a search text.
const MAX_CANDIDATES: usize = 64;

/// Whether the runner may touch files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Write,
    /// Read-only: `Patched` means "would patch"
    Check,
}

/// Outcome for a single target
#[derive(Debug, Clone, PartialEq)]
#[must_use = "PatchStatus should be checked for success/failure"]
pub enum PatchStatus {
    /// File content was (or would be) rewritten
    Patched {
        file: PathBuf,
        substitutions: usize,
        rewrites: usize,
        /// Unsupported constructs the passes could not remove
        remaining: ConstructCounts,
    },
    /// Nothing left to do
    AlreadyCompatible { file: PathBuf },
    /// Nothing matched, but unsupported syntax is still present
    Suspect {
        file: PathBuf,
        remaining: ConstructCounts,
        closest: Option<Candidate>,
    },
    /// Target file does not exist
    Missing { file: PathBuf },
    /// Disabled or excluded by the version gate
    Skipped { reason: String },
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStatus::Patched {
                file,
                substitutions,
                rewrites,
                ..
            } => write!(
                f,
                "Patched {} ({} substitutions, {} rewrites)",
                file.display(),
                substitutions,
                rewrites
            ),
            PatchStatus::AlreadyCompatible { file } => {
                write!(f, "Already compatible: {}", file.display())
            }
            PatchStatus::Suspect {
                file, remaining, ..
            } => write!(
                f,
                "Pattern not found in {} but {} remain",
                file.display(),
                remaining
            ),
            PatchStatus::Missing { file } => write!(f, "File not found: {}", file.display()),
            PatchStatus::Skipped { reason } => write!(f, "Skipped: {}", reason),
        }
    }
}

/// Text near an unsupported construct that most resembles the expected
/// search text.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 1-based line of the construct
    pub line: usize,
    /// Normalized Levenshtein similarity in `[0, 1]`
    pub similarity: f64,
    pub snippet: String,
}

/// Errors while processing a target
#[derive(Debug)]
pub enum ApplicationError {
    /// Version gating error
    Version(VersionError),
    /// File I/O error
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Target path rejected by the workspace guard
    Safety(SafetyError),
    /// Write failed or content changed underneath us
    Edit(EditError),
    /// Workspace root could not be opened
    Workspace { path: PathBuf, reason: String },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
            ApplicationError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ApplicationError::Safety(e) => write!(f, "unsafe target: {}", e),
            ApplicationError::Edit(e) => write!(f, "edit error: {}", e),
            ApplicationError::Workspace { path, reason } => {
                write!(f, "cannot use workspace {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Version(e) => Some(e),
            ApplicationError::Io { source, .. } => Some(source),
            ApplicationError::Safety(e) => Some(e),
            ApplicationError::Edit(e) => Some(e),
            ApplicationError::Workspace { .. } => None,
        }
    }
}

impl From<VersionError> for ApplicationError {
    fn from(e: VersionError) -> Self {
        ApplicationError::Version(e)
    }
}

impl From<SafetyError> for ApplicationError {
    fn from(e: SafetyError) -> Self {
        ApplicationError::Safety(e)
    }
}

impl From<EditError> for ApplicationError {
    fn from(e: EditError) -> Self {
        ApplicationError::Edit(e)
    }
}

/// What processing a target settled on before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetPlan {
    Settled(PatchStatus),
    Rewrite(PendingRewrite),
}

/// New content computed for a target, not yet on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRewrite {
    pub file: PathBuf,
    pub original: String,
    pub new_text: String,
    pub substitutions: usize,
    pub rewrites: usize,
    pub remaining: ConstructCounts,
}

impl PendingRewrite {
    /// Status reported without writing.
    pub fn status(&self) -> PatchStatus {
        PatchStatus::Patched {
            file: self.file.clone(),
            substitutions: self.substitutions,
            rewrites: self.rewrites,
            remaining: self.remaining,
        }
    }

    /// Write the new content after re-checking the path.
    pub fn commit(self, guard: &WorkspaceGuard) -> Result<PatchStatus, ApplicationError> {
        let file = guard.revalidate(&self.file)?;
        let status = self.status();
        match Rewrite::new(&file, &self.original, self.new_text).apply()? {
            RewriteResult::Applied { .. } => Ok(status),
            RewriteResult::AlreadyApplied { file } => Ok(PatchStatus::AlreadyCompatible { file }),
        }
    }
}

/// Path a target refers to, before any checks.
pub fn target_path(set: &PatchSet, target: &TargetDefinition, workspace: &Path) -> PathBuf {
    if set.meta.workspace_relative {
        workspace.join(&target.file)
    } else {
        PathBuf::from(&target.file)
    }
}

/// Run every target of `set` against `workspace`.
///
/// Errors are per target; one failing target never stops the others.
pub fn apply_targets(
    set: &PatchSet,
    workspace: &Path,
    mode: ApplyMode,
) -> Vec<(String, Result<PatchStatus, ApplicationError>)> {
    let guard = match WorkspaceGuard::new(workspace) {
        Ok(guard) => guard,
        Err(e) => {
            let reason = e.to_string();
            return set
                .targets
                .iter()
                .map(|target| {
                    (
                        target.id.clone(),
                        Err(ApplicationError::Workspace {
                            path: workspace.to_path_buf(),
                            reason: reason.clone(),
                        }),
                    )
                })
                .collect();
        }
    };

    set.targets
        .iter()
        .map(|target| {
            let result = plan_target(set, target, workspace, &guard).and_then(|plan| match plan {
                TargetPlan::Settled(status) => Ok(status),
                TargetPlan::Rewrite(pending) => match mode {
                    ApplyMode::Write => pending.commit(&guard),
                    ApplyMode::Check => Ok(pending.status()),
                },
            });
            (target.id.clone(), result)
        })
        .collect()
}

/// Read-only variant of [`apply_targets`].
pub fn check_targets(
    set: &PatchSet,
    workspace: &Path,
) -> Vec<(String, Result<PatchStatus, ApplicationError>)> {
    apply_targets(set, workspace, ApplyMode::Check)
}

/// Decide what to do with one target without writing anything.
pub fn plan_target(
    set: &PatchSet,
    target: &TargetDefinition,
    workspace: &Path,
    guard: &WorkspaceGuard,
) -> Result<TargetPlan, ApplicationError> {
    if !target.enabled {
        let reason = target
            .skip_reason
            .clone()
            .unwrap_or_else(|| "disabled".to_string());
        return Ok(TargetPlan::Settled(PatchStatus::Skipped { reason }));
    }

    let path = target_path(set, target, workspace);
    if !path.exists() {
        return Ok(TargetPlan::Settled(PatchStatus::Missing { file: path }));
    }
    let file = guard.validate_path(&path)?;

    if let (Some(package), Some(range)) = (&target.package, &target.version_range) {
        let installed = package_version(guard.workspace_root(), package)?;
        if !matches_requirement(&installed, Some(range))? {
            let reason = format!("{package} {installed} does not satisfy {}", range.trim());
            return Ok(TargetPlan::Settled(PatchStatus::Skipped { reason }));
        }
    }

    let original = fs::read_to_string(&file).map_err(|source| ApplicationError::Io {
        path: file.clone(),
        source,
    })?;

    let (substituted, substitutions, already_applied) = if target.strategy.substitutes() {
        let outcome = apply_substitutions(&original, &target.substitutions);
        (outcome.text, outcome.applied, outcome.already_applied)
    } else {
        (original.as_str().into(), 0, 0)
    };

    let (new_text, rewrites, remaining) = if target.strategy.transforms() {
        let outcome = Transformer::new(set.meta.rewrite).transform(&target.id, &substituted);
        let rewrites = outcome.rewrites();
        let remaining = outcome.remaining;
        (outcome.code.into_owned(), rewrites, remaining)
    } else {
        let remaining = ConstructCounts::scan(&substituted);
        (substituted.into_owned(), 0, remaining)
    };

    if new_text != original {
        return Ok(TargetPlan::Rewrite(PendingRewrite {
            file,
            original,
            new_text,
            substitutions,
            rewrites,
            remaining,
        }));
    }

    let status = if already_applied == 0 && remaining.has_unsupported() {
        let closest = target
            .substitutions
            .first()
            .and_then(|sub| closest_candidate(&original, &sub.search));
        PatchStatus::Suspect {
            file,
            remaining,
            closest,
        }
    } else {
        PatchStatus::AlreadyCompatible { file }
    };
    Ok(TargetPlan::Settled(status))
}

/// Compare `search` against the text at each unsupported-construct site and
/// return the most similar one.
pub fn closest_candidate(text: &str, search: &str) -> Option<Candidate> {
    let width = search.chars().count();
    unsupported_offsets(text)
        .into_iter()
        .take(MAX_CANDIDATES)
        .map(|offset| {
            let window: String = text[offset..].chars().take(width).collect();
            let similarity = strsim::normalized_levenshtein(search, &window);
            (offset, similarity, window)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(offset, similarity, snippet)| Candidate {
            line: text[..offset].matches('\n').count() + 1,
            similarity,
            snippet,
        })
}
