use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use cursor_patcher::config::{load_from_path, PatcherConfig};
use cursor_patcher::{
    BackupManager, Completion, InstallationStatus, PatchOrchestrator, PatchOutcome,
    PipelineError, RunMode, SourcePatcher, TracingDiagnostics, VersionPolicy,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Exit status for any failed pipeline stage.
const EXIT_FAILED: i32 = 1;
/// Exit status when the host OS has no known installation layout.
const EXIT_UNSUPPORTED_PLATFORM: i32 = 2;

#[derive(Parser)]
#[command(name = "cursor-patcher")]
#[command(about = "Patch Cursor's machine-id accessors with a reversible backup", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "CURSOR_PATCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Application base directory (the one containing package.json)
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Lowest version allowed to be patched (empty disables the bound)
    #[arg(long, global = true)]
    min_version: Option<String>,

    /// Highest version allowed to be patched
    #[arg(long, global = true)]
    max_version: Option<String>,

    /// Never wait for Enter after printing installation guidance
    #[arg(long, global = true)]
    no_pause: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up and patch out/main.js (default)
    Patch {
        /// Show what would change without touching any file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Restore out/main.js from its backup
    Restore,

    /// Report installation, version and patch state
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(&cli)?;
    let diagnostics = TracingDiagnostics::new(config.install.pause_on_missing_base);

    let policy = config.version_policy()?;
    let orchestrator = match build_orchestrator(&config, policy, &diagnostics) {
        Ok(orchestrator) => orchestrator,
        Err(e) => fail(&e),
    };

    match cli.command.unwrap_or(Commands::Patch {
        dry_run: false,
        diff: false,
    }) {
        Commands::Patch { dry_run: true, diff } => cmd_dry_run(&orchestrator, diff),
        Commands::Patch {
            dry_run: false,
            diff,
        } => cmd_patch(&orchestrator, diff),
        Commands::Restore => cmd_restore(&orchestrator),
        Commands::Status => cmd_status(&orchestrator),
    }
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the config file (if any) and layer CLI flags on top.
fn resolve_config(cli: &Cli) -> Result<PatcherConfig> {
    let mut config = match &cli.config {
        Some(path) => load_from_path(path)?,
        None => PatcherConfig::default(),
    };

    if let Some(base) = &cli.base_dir {
        config.install.base_dir = Some(base.clone());
    }
    if let Some(min) = &cli.min_version {
        config.policy.min_version = Some(min.clone());
    }
    if let Some(max) = &cli.max_version {
        config.policy.max_version = Some(max.clone());
    }
    if cli.no_pause {
        config.install.pause_on_missing_base = false;
    }

    config.validate()?;
    Ok(config)
}

fn build_orchestrator<'a>(
    config: &PatcherConfig,
    policy: VersionPolicy,
    diagnostics: &'a TracingDiagnostics,
) -> std::result::Result<PatchOrchestrator<'a>, PipelineError> {
    let locator = config.locator()?;
    Ok(PatchOrchestrator::new(locator, policy, diagnostics))
}

/// Report a failed stage and exit with its status code.
fn fail(error: &PipelineError) -> ! {
    eprintln!(
        "{} Failed at stage '{}': {}",
        "✗".red(),
        error.stage(),
        error
    );

    if error.is_unsupported_platform() {
        std::process::exit(EXIT_UNSUPPORTED_PLATFORM);
    }

    if error.is_version_too_new() {
        eprintln!(
            "  {}",
            "This version is newer than the patchable range; see the project help for manual steps."
                .yellow()
        );
    } else if matches!(error, PipelineError::VersionPolicy { .. }) {
        eprintln!(
            "  {}",
            "This version predates the patchable accessors; reset the machine id instead.".yellow()
        );
    }

    if matches!(error, PipelineError::Patch(_)) {
        eprintln!(
            "  {}",
            "The backup taken before patching is intact; run `cursor-patcher restore` to undo."
                .dimmed()
        );
    }

    std::process::exit(EXIT_FAILED);
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
        if change.missing_newline() {
            println!();
        }
    }
}

fn print_outcome(target: &Path, outcome: &PatchOutcome, dry_run: bool) {
    match outcome {
        PatchOutcome::Applied { replacements } => {
            let verb = if dry_run { "Would rewrite" } else { "Rewrote" };
            println!(
                "{} {} {} accessor(s) in {}",
                "✓".green(),
                verb,
                replacements,
                target.display()
            );
        }
        PatchOutcome::AlreadyApplied => {
            println!("{} Already patched: {}", "⊙".yellow(), target.display());
        }
        PatchOutcome::NoPatternMatched => {
            println!(
                "{} No known machine-id accessor found in {}",
                "⊘".cyan(),
                target.display()
            );
            println!(
                "  {}",
                "The bundled code may have changed shape; nothing was modified.".dimmed()
            );
        }
    }
}

fn cmd_patch(orchestrator: &PatchOrchestrator<'_>, show_diff: bool) -> Result<()> {
    let completion = match orchestrator.run(RunMode::Patch) {
        Ok(completion) => completion,
        Err(e) => fail(&e),
    };

    if let Completion::Done {
        paths,
        version,
        outcome,
    } = completion
    {
        println!("Target: {}", paths.target_path.display());
        println!("Version: {}", version);
        print_outcome(&paths.target_path, &outcome, false);

        let backup = BackupManager::new(&paths.target_path);
        println!("Backup: {}", backup.backup_path().display());

        if show_diff && matches!(outcome, PatchOutcome::Applied { .. }) {
            let before = fs::read_to_string(backup.backup_path())?;
            let after = fs::read_to_string(&paths.target_path)?;
            display_diff(&paths.target_path, &before, &after);
        }
    }

    Ok(())
}

fn cmd_dry_run(orchestrator: &PatchOrchestrator<'_>, show_diff: bool) -> Result<()> {
    let status = match orchestrator.probe() {
        Ok(status) => status,
        Err(e) => fail(&e),
    };

    println!("{}", "[DRY RUN - no files will be modified]".cyan());
    print_status(&status, orchestrator);

    if let Some(violation) = status.violation {
        fail(&PipelineError::VersionPolicy {
            version: status.version,
            violation,
        });
    }

    let preview = match SourcePatcher::new(&status.paths.target_path).preview() {
        Ok(preview) => preview,
        Err(e) => fail(&PipelineError::Patch(e)),
    };
    print_outcome(&status.paths.target_path, &preview.outcome, true);

    if show_diff && preview.original != preview.patched {
        display_diff(&status.paths.target_path, &preview.original, &preview.patched);
    }

    Ok(())
}

fn cmd_restore(orchestrator: &PatchOrchestrator<'_>) -> Result<()> {
    match orchestrator.run(RunMode::Restore) {
        Ok(Completion::RestoreDone { paths }) => {
            println!(
                "{} Restored {} from backup",
                "✓".green(),
                paths.target_path.display()
            );
            Ok(())
        }
        Ok(other) => anyhow::bail!("unexpected completion in restore mode: {other:?}"),
        Err(e) => fail(&e),
    }
}

fn cmd_status(orchestrator: &PatchOrchestrator<'_>) -> Result<()> {
    let status = match orchestrator.probe() {
        Ok(status) => status,
        Err(e) => fail(&e),
    };

    println!("{}", "Installation Status Report".bold());
    print_status(&status, orchestrator);
    Ok(())
}

fn print_status(status: &InstallationStatus, orchestrator: &PatchOrchestrator<'_>) {
    println!("Manifest: {}", status.paths.manifest_path.display());
    println!("Target: {}", status.paths.target_path.display());
    println!("Version: {}", status.version);

    match status.violation {
        None => println!(
            "{} Version policy ({}): {}",
            "✓".green(),
            orchestrator.policy(),
            "satisfied".green()
        ),
        Some(violation) => println!(
            "{} Version policy ({}): {}",
            "✗".red(),
            orchestrator.policy(),
            violation.to_string().red()
        ),
    }

    let state = match status.patch_state {
        PatchOutcome::Applied { replacements } => {
            format!("{} accessor(s) not yet patched", replacements).yellow()
        }
        PatchOutcome::AlreadyApplied => "patched".green(),
        PatchOutcome::NoPatternMatched => "no known accessor pattern".cyan(),
    };
    println!("Patch state: {}", state);

    let backup = if status.backup_present {
        "present".green()
    } else {
        "none".dimmed()
    };
    println!("Backup: {}", backup);
}
