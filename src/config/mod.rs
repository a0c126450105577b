pub mod applicator;
pub mod loader;
pub mod schema;
pub mod version;

pub use applicator::{
    apply_targets, check_targets, closest_candidate, plan_target, target_path, ApplicationError,
    ApplyMode, Candidate, PatchStatus, PendingRewrite, TargetPlan,
};
pub use loader::{discover, load_dir, load_from_path, load_from_str, ConfigError};
pub use schema::{
    Metadata, PatchSet, Strategy, TargetDefinition, ValidationError, ValidationIssue,
};
pub use version::{manifest_path, matches_requirement, package_version, VersionError};
