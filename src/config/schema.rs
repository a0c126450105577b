use crate::substitute::Substitution;
use crate::transform::RewriteOptions;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub targets: Vec<TargetDefinition>,
}

impl PatchSet {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.targets.is_empty() {
            issues.push(ValidationIssue::EmptyTargetList);
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            let id = target.id.trim();
            if id.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "id",
                });
            } else if !seen.insert(id) {
                issues.push(ValidationIssue::DuplicateId { id: id.to_string() });
            }

            if target.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: Some(target.id.clone()),
                    field: "file",
                });
            }

            if target.strategy == Strategy::Substitute && target.substitutions.is_empty() {
                issues.push(ValidationIssue::InvalidCombo {
                    target_id: Some(target.id.clone()),
                    message: "substitute strategy requires at least one substitution".to_string(),
                });
            }

            for sub in &target.substitutions {
                if sub.search.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        target_id: Some(target.id.clone()),
                        field: "substitutions.search",
                    });
                }
            }

            if target.version_range.is_some() && target.package.is_none() {
                issues.push(ValidationIssue::InvalidCombo {
                    target_id: Some(target.id.clone()),
                    message: "version_range requires package".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Targets that will be considered by the runner.
    pub fn enabled_targets(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.targets.iter().filter(|target| target.enabled)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve target paths against the workspace root rather than the
    /// current directory
    #[serde(default = "default_true")]
    pub workspace_relative: bool,
    /// Options for the general transformer pass
    #[serde(default)]
    pub rewrite: RewriteOptions,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            workspace_relative: true,
            rewrite: RewriteOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetDefinition {
    pub id: String,
    pub file: String,
    /// npm package whose installed version gates this target
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub version_range: Option<String>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

/// How a target file is made compatible.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Exact substitutions only
    Substitute,
    /// General transformer only
    Transform,
    /// Substitutions first, then the transformer over what is left
    #[default]
    SubstituteThenTransform,
}

impl Strategy {
    pub fn substitutes(self) -> bool {
        matches!(self, Strategy::Substitute | Strategy::SubstituteThenTransform)
    }

    pub fn transforms(self) -> bool {
        matches!(self, Strategy::Transform | Strategy::SubstituteThenTransform)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Substitute => "substitute",
            Strategy::Transform => "transform",
            Strategy::SubstituteThenTransform => "substitute-then-transform",
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyTargetList,
    MissingField {
        target_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        id: String,
    },
    InvalidCombo {
        target_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTargetList => write!(f, "patch set contains no targets"),
            ValidationIssue::MissingField { target_id, field } => match target_id {
                Some(id) => write!(f, "target '{id}' missing required field '{field}'"),
                None => write!(f, "target missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { id } => {
                write!(f, "target id '{id}' is used more than once")
            }
            ValidationIssue::InvalidCombo { target_id, message } => match target_id {
                Some(id) => write!(f, "target '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid target configuration: {message}"),
            },
        }
    }
}
