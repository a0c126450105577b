use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use regex_compat::config::{
    check_targets, discover, load_from_path, plan_target, ApplicationError, PatchStatus,
    TargetPlan,
};
use regex_compat::{
    ConstructCounts, EscapeDepth, Rewrite, RewriteOptions, Transformer, WorkspaceGuard,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const WORKSPACE_ENV: &str = "REGEX_COMPAT_WORKSPACE";

/// File extensions picked up when a directory is given.
const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

#[derive(Parser)]
#[command(name = "regex-compat")]
#[command(
    about = "Rewrite lookbehinds and named groups in JavaScript for older regex engines",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch sets to the packages installed in a workspace
    Apply {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific patch set to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which targets are patched without touching files
    Status {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Rewrite unsupported regex syntax in arbitrary files or directories
    Transform {
        /// Files or directories (walked for .js, .mjs, .cjs)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Write results back (default only reports)
        #[arg(long)]
        write: bool,

        /// Show unified diff of changes
        #[arg(long)]
        diff: bool,

        /// Escaping of RegExp(...) string arguments in the input
        #[arg(long, value_enum, default_value_t = StringEscape::Double)]
        string_escape: StringEscape,
    },

    /// Count unsupported regex constructs without rewriting
    Scan {
        /// Files or directories (walked for .js, .mjs, .cjs)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List targets of the discovered patch sets
    List {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StringEscape {
    /// Pattern text is written once per backslash
    Single,
    /// Every regex backslash is written as two
    Double,
}

impl From<StringEscape> for EscapeDepth {
    fn from(value: StringEscape) -> Self {
        match value {
            StringEscape::Single => EscapeDepth::Single,
            StringEscape::Double => EscapeDepth::Double,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            workspace,
            patches,
            dry_run,
            diff,
        } => cmd_apply(workspace, patches, dry_run, diff),

        Commands::Status { workspace } => cmd_status(workspace),

        Commands::Transform {
            paths,
            write,
            diff,
            string_escape,
        } => cmd_transform(&paths, write, diff, string_escape.into()),

        Commands::Scan { paths } => cmd_scan(&paths),

        Commands::List { workspace } => cmd_list(workspace),
    }
}

/// Discover patch sets.
///
/// Discovery order:
/// 1. `<workspace>/patches`
/// 2. `./patches` relative to the current working directory
fn discover_patch_files(workspace: &Path) -> Result<Vec<PathBuf>> {
    let cwd_patches_dir = env::current_dir().ok().map(|cwd| cwd.join("patches"));
    let candidate_dirs = std::iter::once(workspace.join("patches")).chain(cwd_patches_dir);

    for patches_dir in candidate_dirs {
        if !patches_dir.is_dir() {
            continue;
        }
        let files = discover(&patches_dir)?;
        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml patch sets found in either {}/patches or ./patches",
        workspace.display()
    )
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. REGEX_COMPAT_WORKSPACE environment variable
/// 3. Nearest ancestor holding both package.json and node_modules
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return Ok(path.canonicalize()?);
    }

    if let Ok(env_path) = env::var(WORKSPACE_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: {WORKSPACE_ENV} is set but path doesn't exist: {env_path}").yellow()
        );
    }

    if let Some(path) = auto_detect_workspace() {
        println!(
            "{}",
            format!("Auto-detected workspace: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find a JavaScript workspace.".red(),
        "Try one of:".bold(),
        "1. cd into the project that holds package.json and node_modules",
        "2. Specify explicitly: regex-compat apply --workspace /path/to/app",
        format!("3. Set environment variable: export {WORKSPACE_ENV}=/path/to/app")
    )
}

fn auto_detect_workspace() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;
    current
        .ancestors()
        .find(|dir| dir.join("package.json").is_file() && dir.join("node_modules").is_dir())
        .map(Path::to_path_buf)
}

/// Expand directories into the script files under them, sorted per root.
fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_source_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (compatible)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", line);
        if change.missing_newline() {
            println!();
        }
    }
}

#[derive(Default)]
struct Tally {
    patched: usize,
    already: usize,
    suspect: usize,
    missing: usize,
    skipped: usize,
    failed: usize,
}

impl Tally {
    fn record(
        &mut self,
        target_id: &str,
        result: &Result<PatchStatus, ApplicationError>,
        dry_run: bool,
    ) {
        match result {
            Ok(PatchStatus::Patched {
                file,
                substitutions,
                rewrites,
                remaining,
            }) => {
                let verb = if dry_run { "Would patch" } else { "Patched" };
                println!(
                    "{} {}: {} {} ({} substitutions, {} rewrites)",
                    "✓".green(),
                    target_id,
                    verb,
                    file.display(),
                    substitutions,
                    rewrites
                );
                if !remaining.is_empty() {
                    println!("  {}", format!("still contains {remaining}").yellow());
                }
                self.patched += 1;
            }
            Ok(PatchStatus::AlreadyCompatible { file }) => {
                println!(
                    "{} {}: Already compatible {}",
                    "⊙".yellow(),
                    target_id,
                    file.display()
                );
                self.already += 1;
            }
            Ok(PatchStatus::Suspect {
                file,
                remaining,
                closest,
            }) => {
                println!(
                    "{} {}: Pattern not found in {}",
                    "?".yellow(),
                    target_id,
                    file.display()
                );
                println!("  {}", format!("but it still contains {remaining}").yellow());
                if let Some(candidate) = closest {
                    println!(
                        "  Closest match at line {} ({:.0}% similar): {}",
                        candidate.line,
                        candidate.similarity * 100.0,
                        candidate.snippet.dimmed()
                    );
                }
                println!("  Possible causes:");
                println!("    - The package was upgraded and the pattern changed");
                println!("    - The file was bundled differently");
                self.suspect += 1;
            }
            Ok(PatchStatus::Missing { file }) => {
                println!(
                    "{} {}: File not found {}",
                    "-".dimmed(),
                    target_id,
                    file.display()
                );
                self.missing += 1;
            }
            Ok(PatchStatus::Skipped { reason }) => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), target_id, reason);
                self.skipped += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), target_id, e);
                if let ApplicationError::Edit(edit_err) = e {
                    eprintln!("  Action: re-run; the file changed while it was being patched");
                    eprintln!("  Edit error: {}", edit_err);
                }
                self.failed += 1;
            }
        }
    }

    fn print_summary(&self) {
        println!("{}", "Summary:".bold());
        println!("  {} patched", format!("{}", self.patched).green());
        println!("  {} already compatible", format!("{}", self.already).yellow());
        println!("  {} suspect", format!("{}", self.suspect).yellow());
        println!("  {} missing", self.missing);
        println!("  {} skipped", format!("{}", self.skipped).cyan());
        println!("  {} failed", format!("{}", self.failed).red());
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    patches: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;

    let patch_files = match patches {
        Some(path) => vec![path],
        None => discover_patch_files(&workspace)?,
    };

    let guard = WorkspaceGuard::new(&workspace)?;

    println!("Workspace: {}", workspace.display());
    println!();

    let mut tally = Tally::default();

    for patch_file in patch_files {
        println!("Loading patch set from {}...", patch_file.display());
        let set = load_from_path(&patch_file)?;

        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be patched]".cyan());
        }

        for target in &set.targets {
            let mut preview = None;
            let result = plan_target(&set, target, &workspace, &guard).and_then(|plan| match plan {
                TargetPlan::Settled(status) => Ok(status),
                TargetPlan::Rewrite(pending) => {
                    if show_diff {
                        preview = Some((
                            pending.file.clone(),
                            pending.original.clone(),
                            pending.new_text.clone(),
                        ));
                    }
                    if dry_run {
                        Ok(pending.status())
                    } else {
                        pending.commit(&guard)
                    }
                }
            });

            tally.record(&target.id, &result, dry_run);

            if let Some((file, before, after)) = preview {
                display_diff(&file, &before, &after);
            }
        }

        println!();
    }

    tally.print_summary();

    if tally.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = discover_patch_files(&workspace)?;

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut compatible = Vec::new();
    let mut pending = Vec::new();
    let mut skipped = Vec::new();

    for patch_file in patch_files {
        let set = load_from_path(&patch_file)?;

        for (target_id, result) in check_targets(&set, &workspace) {
            match result {
                Ok(PatchStatus::AlreadyCompatible { .. }) => compatible.push(target_id),
                Ok(PatchStatus::Patched { .. }) => {
                    pending.push((target_id, "would be patched".to_string()))
                }
                Ok(PatchStatus::Suspect { remaining, .. }) => pending.push((
                    target_id,
                    format!("pattern not found, {remaining} remain"),
                )),
                Ok(PatchStatus::Missing { file }) => {
                    pending.push((target_id, format!("missing {}", file.display())))
                }
                Ok(PatchStatus::Skipped { reason }) => skipped.push((target_id, reason)),
                Err(e) => pending.push((target_id, e.to_string())),
            }
        }
    }

    if !compatible.is_empty() {
        println!(
            "{} {} ({} targets)",
            "✓".green(),
            "COMPATIBLE".green().bold(),
            compatible.len()
        );
        for id in &compatible {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} targets)",
            "⊙".yellow(),
            "NOT PATCHED".yellow().bold(),
            pending.len()
        );
        for (id, reason) in &pending {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} targets)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_transform(
    paths: &[PathBuf],
    write: bool,
    show_diff: bool,
    string_escape: EscapeDepth,
) -> Result<()> {
    let files = collect_sources(paths)?;
    let transformer = Transformer::new(RewriteOptions {
        string_escape,
        ..RewriteOptions::default()
    });

    let mut rewritten = 0;
    let mut warnings = 0;
    let mut failed = 0;

    for file in &files {
        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                failed += 1;
                continue;
            }
        };

        let unit = file.display().to_string();
        let outcome = transformer.transform(&unit, &source);

        if outcome.changed() {
            println!(
                "{} {}: {} literals, {} constructor calls rewritten",
                "✓".green(),
                unit,
                outcome.literals_rewritten,
                outcome.constructors_rewritten
            );
            if show_diff {
                display_diff(file, &source, &outcome.code);
            }
            rewritten += 1;
        }

        for warning in outcome.warnings() {
            eprintln!("{} {}", "warning:".yellow(), warning);
            warnings += 1;
        }

        if write && outcome.changed() {
            let new_text = outcome.code.into_owned();
            if let Err(e) = Rewrite::new(file, &source, new_text).apply() {
                eprintln!("{} {}: {}", "✗".red(), unit, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} files scanned", files.len());
    println!("  {} rewritten", format!("{}", rewritten).green());
    println!("  {} warnings", format!("{}", warnings).yellow());
    println!("  {} failed", format!("{}", failed).red());

    if rewritten > 0 && !write {
        println!("{}", "Run again with --write to save the changes.".dimmed());
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_scan(paths: &[PathBuf]) -> Result<()> {
    let files = collect_sources(paths)?;
    let mut flagged = 0;
    let mut total = ConstructCounts::default();

    for file in &files {
        let source = fs::read_to_string(file)?;
        let counts = ConstructCounts::scan(&source);
        if counts.is_empty() {
            continue;
        }
        let line = format!("{}: {}", file.display(), counts);
        if counts.has_unsupported() {
            println!("{} {}", "✗".red(), line);
            flagged += 1;
        } else {
            println!("{} {}", "?".yellow(), line);
        }
        total.named_groups += counts.named_groups;
        total.lookbehinds += counts.lookbehinds;
        total.named_backreferences += counts.named_backreferences;
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} files scanned", files.len());
    println!("  {} need rewriting", format!("{}", flagged).red());
    println!("  totals: {}", total);

    Ok(())
}

fn cmd_list(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = discover_patch_files(&workspace)?;

    for patch_file in patch_files {
        let set = load_from_path(&patch_file)?;
        let name = if set.meta.name.is_empty() {
            patch_file.display().to_string()
        } else {
            set.meta.name.clone()
        };
        println!("{}", name.bold());
        if let Some(description) = &set.meta.description {
            println!("  {}", description.dimmed());
        }

        for target in &set.targets {
            let marker = if target.enabled {
                "•".green()
            } else {
                "⊘".cyan()
            };
            println!("  {} {} [{}]", marker, target.id, target.strategy);
            println!("      file: {}", target.file);
            if let Some(package) = &target.package {
                let range = target.version_range.as_deref().unwrap_or("*");
                println!("      package: {} {}", package, range);
            }
            if !target.substitutions.is_empty() {
                println!("      substitutions: {}", target.substitutions.len());
            }
            if !target.enabled {
                let reason = target.skip_reason.as_deref().unwrap_or("disabled");
                println!("      skipped: {}", reason.dimmed());
            }
        }
        println!();
    }

    Ok(())
}
