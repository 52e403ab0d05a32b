//! CJ-017: CLI subcommands — init, validate, plan, tasks, run.

use crate::core::error::{Error, Result};
use crate::core::executor::{self, TaskStatus};
use crate::core::graph::TASK_GROUP;
use crate::core::orchestrator::{self, ConfiguredBuild};
use crate::core::{parser, types};
use crate::extract::RepositoryExtractor;
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "conjure.yaml";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new conjure definition project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Root unit name
        #[arg(short, long, default_value = "api")]
        name: String,
    },

    /// Validate conjure.yaml and the discovered topology
    Validate {
        /// Path to conjure.yaml
        #[arg(short, long, default_value = MANIFEST_FILE)]
        file: PathBuf,
    },

    /// Show the configured task graph in execution order
    Plan {
        /// Path to conjure.yaml
        #[arg(short, long, default_value = MANIFEST_FILE)]
        file: PathBuf,

        /// Emit the graph and unit configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the conjure tasks with their descriptions
    Tasks {
        /// Path to conjure.yaml
        #[arg(short, long, default_value = MANIFEST_FILE)]
        file: PathBuf,

        /// Include ungrouped helper tasks
        #[arg(long)]
        all: bool,
    },

    /// Run tasks and everything they depend on
    Run {
        /// Task names (`compileConjure`) or paths (`:api:compileConjure`)
        #[arg(default_value = "compileConjure")]
        tasks: Vec<String>,

        /// Path to conjure.yaml
        #[arg(short, long, default_value = MANIFEST_FILE)]
        file: PathBuf,

        /// Re-run tasks even when up to date
        #[arg(long)]
        force: bool,

        /// Show what would be executed without running
        #[arg(long)]
        dry_run: bool,

        /// Keep running independent tasks after a failure
        #[arg(long)]
        keep_going: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path, name } => cmd_init(&path, &name),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, json } => cmd_plan(&file, json),
        Commands::Tasks { file, all } => cmd_tasks(&file, all),
        Commands::Run {
            tasks,
            file,
            force,
            dry_run,
            keep_going,
        } => cmd_run(&file, &tasks, force, dry_run, keep_going),
    }
}

fn cmd_init(path: &Path, name: &str) -> Result<()> {
    let manifest_path = path.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(Error::Manifest(format!("{} already exists", manifest_path.display())));
    }

    let source_dir = path.join("src/main/conjure");
    std::fs::create_dir_all(&source_dir).map_err(|e| Error::io("cannot create dir", &source_dir, e))?;

    let template = format!(
        r#"root: {name}

units:
  {name}-objects: {{}}
  {name}-jersey: {{}}

# Custom generators: group:conjure-<language>:version
generators: []

versions:
  com.palantir.conjure:conjure: 4.13.0
  com.palantir.conjure.java:conjure-java: 8.0.0

options:
  java: {{}}

policy:
  failure: stop_on_first
"#
    );
    std::fs::write(&manifest_path, template).map_err(|e| Error::io("cannot write", &manifest_path, e))?;

    let example = source_dir.join(format!("{}.yml", name));
    if !example.exists() {
        let body = "types:\n  definitions:\n    default-package: com.example.api\n    objects: {}\n";
        std::fs::write(&example, body).map_err(|e| Error::io("cannot write", &example, e))?;
    }

    println!("Initialized conjure project at {}", path.display());
    println!("  Created: {}", manifest_path.display());
    println!("  Created: {}", example.display());
    Ok(())
}

/// Parse and validate a manifest, returning it with the topology it describes.
fn load(file: &Path) -> Result<(types::Manifest, types::Project)> {
    let manifest = parser::parse_manifest_file(file)?;
    let errors = parser::validate_manifest(&manifest);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(Error::Manifest(format!("{} validation error(s)", errors.len())));
    }
    let base_dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let project = types::Project::from_manifest(&manifest, &base_dir);
    Ok((manifest, project))
}

fn configure(file: &Path) -> Result<(types::Manifest, types::Project, ConfiguredBuild)> {
    let (manifest, project) = load(file)?;
    let build = orchestrator::configure_manifest(&manifest, &project)?;
    for w in &build.warnings {
        eprintln!("  WARNING: {}", w);
    }
    Ok((manifest, project, build))
}

fn cmd_validate(file: &Path) -> Result<()> {
    let (manifest, _, build) = configure(file)?;
    println!(
        "OK: {} ({} units, {} generators, {} tasks)",
        manifest.root,
        build.units.len(),
        manifest.generators.len(),
        build.graph.len()
    );
    Ok(())
}

fn cmd_plan(file: &Path, json: bool) -> Result<()> {
    let (_, _, build) = configure(file)?;
    let order = build.graph.topological_order()?;

    if json {
        let doc = serde_json::json!({ "order": order, "build": build });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| Error::Manifest(format!("cannot encode plan: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Plan: {} ({} tasks)", build.root, order.len());
    println!();
    for task in &order {
        let Some(item) = build.graph.get(task) else {
            continue;
        };
        let kind = action_label(&item.action);
        if item.depends_on.is_empty() {
            println!("  {} [{}]", task, kind);
        } else {
            let deps: Vec<&str> = item.depends_on.iter().map(String::as_str).collect();
            println!("  {} [{}] <- {}", task, kind, deps.join(", "));
        }
    }

    println!();
    for (unit, config) in &build.units {
        println!("{} ({}):", unit, config.mapping.language());
        for dep in &config.dependencies {
            let target = match &dep.target {
                types::DependencyTarget::Library(c) => c.to_string(),
                types::DependencyTarget::Unit(u) => format!("unit {}", u),
            };
            println!("  {:?} {}", dep.scope, target);
        }
    }
    Ok(())
}

fn action_label(action: &types::Action) -> &'static str {
    match action {
        types::Action::Lifecycle => "aggregate",
        types::Action::External => "external",
        types::Action::CopySources { .. } => "copy",
        types::Action::Extract { .. } => "extract",
        types::Action::CompileIr { .. } => "compile-ir",
        types::Action::Generate { .. } => "generate",
        types::Action::WriteFile { .. } => "write",
        types::Action::Exec { .. } => "exec",
        types::Action::Delete { .. } => "delete",
    }
}

fn cmd_tasks(file: &Path, all: bool) -> Result<()> {
    let (_, _, build) = configure(file)?;
    println!("{} tasks", TASK_GROUP);
    println!("{}", "-".repeat(TASK_GROUP.len() + 6));
    for item in build.graph.items() {
        match (&item.group, &item.description) {
            (Some(group), Some(description)) if group == TASK_GROUP => {
                println!("{} - {}", item.name, description)
            }
            _ if all && !matches!(item.action, types::Action::External) => {
                println!("{}", item.path)
            }
            _ => {}
        }
    }
    Ok(())
}

/// Qualify bare task names with the root unit.
fn resolve_targets(root: &str, tasks: &[String]) -> Vec<String> {
    tasks
        .iter()
        .map(|t| {
            if t.starts_with(':') {
                t.clone()
            } else {
                types::task_path(root, t)
            }
        })
        .collect()
}

fn cmd_run(file: &Path, tasks: &[String], force: bool, dry_run: bool, keep_going: bool) -> Result<()> {
    let (manifest, project, build) = configure(file)?;
    let targets = resolve_targets(&project.root.name, tasks);
    let build_dir = project.root.build_dir();

    let repository = manifest
        .repository
        .as_ref()
        .map(|r| project.root.dir.join(r))
        .unwrap_or_else(|| project.root.dir.join("repository"));
    let cache_dir = manifest
        .cache_dir
        .as_ref()
        .map(|c| project.root.dir.join(c))
        .unwrap_or_else(|| build_dir.join("conjurer-cache"));
    let extractor = RepositoryExtractor::new(repository, cache_dir);

    let failure_policy = if keep_going {
        types::FailurePolicy::ContinueIndependent
    } else {
        manifest.policy.failure
    };

    let result = executor::run(&executor::RunConfig {
        build: &build,
        build_dir: &build_dir,
        extractor: &extractor,
        targets: &targets,
        force,
        dry_run,
        failure_policy,
    })?;

    for report in &result.reports {
        let symbol = match &report.status {
            TaskStatus::Executed => "+".to_string(),
            TaskStatus::UpToDate => "=".to_string(),
            TaskStatus::NoWork => " ".to_string(),
            TaskStatus::Planned => "?".to_string(),
            TaskStatus::Skipped { reason } => format!("- ({})", reason),
            TaskStatus::Failed { message } => format!("! ({})", message),
        };
        println!("  {} {}", report.task, symbol);
    }

    if dry_run {
        println!("Dry run: {} task(s), nothing executed.", result.reports.len());
        return Ok(());
    }

    println!();
    println!(
        "Run: {} executed, {} up to date, {} failed, {} skipped ({:.1}s)",
        result.executed,
        result.up_to_date,
        result.failed,
        result.skipped,
        result.total_duration.as_secs_f64()
    );
    match result.first_failure() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
