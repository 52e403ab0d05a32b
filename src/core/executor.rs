//! CJ-012: Executor — runs a configured task graph.
//!
//! Runs the closure of the requested tasks in topological order:
//! order → fingerprint → up-to-date check → action → output hash → state.

use super::error::{Error, Result};
use super::hasher;
use super::orchestrator::ConfiguredBuild;
use super::state::{self, BuildState, TaskRecord};
use super::types::*;
use crate::extract::ExecutableExtractor;
use crate::transport;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// File inside an extraction directory recording the materialized executable.
pub const EXECUTABLE_POINTER: &str = "executable.path";

/// Configuration for a run.
pub struct RunConfig<'a> {
    pub build: &'a ConfiguredBuild,
    /// Root unit build directory; holds the state file
    pub build_dir: &'a Path,
    pub extractor: &'a dyn ExecutableExtractor,
    pub targets: &'a [String],
    pub force: bool,
    pub dry_run: bool,
    pub failure_policy: FailurePolicy,
}

/// What happened to one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Action ran successfully.
    Executed,
    /// Fingerprint unchanged and outputs present.
    UpToDate,
    /// Aggregate or externally owned; nothing to run.
    NoWork,
    /// Listed only (dry run).
    Planned,
    /// Not run because an upstream failed or the run stopped.
    Skipped { reason: String },
    /// Action failed.
    Failed { message: String },
}

/// Per-item report.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub duration_seconds: f64,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub reports: Vec<TaskReport>,
    pub executed: u32,
    pub up_to_date: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(skip)]
    pub total_duration: Duration,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn status_of(&self, task: &str) -> Option<&TaskStatus> {
        self.reports.iter().find(|r| r.task == task).map(|r| &r.status)
    }

    /// First failure as an error, if any.
    pub fn first_failure(&self) -> Option<Error> {
        self.reports.iter().find_map(|r| match &r.status {
            TaskStatus::Failed { message } => Some(Error::TaskFailed {
                task: r.task.clone(),
                message: message.clone(),
            }),
            _ => None,
        })
    }

    fn push(&mut self, task: &str, status: TaskStatus, duration: f64) {
        match status {
            TaskStatus::Executed => self.executed += 1,
            TaskStatus::UpToDate => self.up_to_date += 1,
            TaskStatus::Failed { .. } => self.failed += 1,
            TaskStatus::Skipped { .. } => self.skipped += 1,
            TaskStatus::NoWork | TaskStatus::Planned => {}
        }
        self.reports.push(TaskReport {
            task: task.to_string(),
            status,
            duration_seconds: duration,
        });
    }
}

/// Execute the requested tasks and everything they depend on.
pub fn run(cfg: &RunConfig) -> Result<RunResult> {
    let start = Instant::now();
    let graph = &cfg.build.graph;
    let order = graph.order_for(cfg.targets)?;
    let mut result = RunResult {
        reports: Vec::with_capacity(order.len()),
        executed: 0,
        up_to_date: 0,
        failed: 0,
        skipped: 0,
        total_duration: Duration::ZERO,
    };

    if cfg.dry_run {
        for task in &order {
            result.push(task, TaskStatus::Planned, 0.0);
        }
        result.total_duration = start.elapsed();
        return Ok(result);
    }

    let mut build_state =
        state::load_state(cfg.build_dir)?.unwrap_or_else(|| BuildState::new(&cfg.build.root));
    let mut runner = Runner {
        cfg,
        executables: HashMap::new(),
        output_hashes: HashMap::new(),
    };
    let mut blocked: HashSet<String> = HashSet::new();
    let mut stopped = false;

    for task in &order {
        let item = graph
            .get(task)
            .ok_or_else(|| Error::UnknownTask(task.clone()))?;

        if stopped {
            blocked.insert(task.clone());
            result.push(task, skipped("run stopped after an earlier failure"), 0.0);
            continue;
        }
        if let Some(upstream) = item.depends_on.iter().find(|d| blocked.contains(*d)) {
            blocked.insert(task.clone());
            let reason = format!("upstream {} did not complete", upstream);
            result.push(task, skipped(&reason), 0.0);
            continue;
        }

        let item_start = Instant::now();
        match runner.run_item(item, &mut build_state) {
            Ok(status) => {
                let duration = item_start.elapsed().as_secs_f64();
                if status == TaskStatus::Executed {
                    if let Some(record) = build_state.tasks.get_mut(task) {
                        record.duration_seconds = Some(duration);
                    }
                }
                result.push(task, status, duration);
            }
            Err(e) => {
                let duration = item_start.elapsed().as_secs_f64();
                error!(task = %task, "{}", e);
                build_state.tasks.shift_remove(task);
                blocked.insert(task.clone());
                result.push(task, TaskStatus::Failed { message: e.to_string() }, duration);
                if cfg.failure_policy == FailurePolicy::StopOnFirst {
                    warn!(task = %task, "stopping after first failure");
                    stopped = true;
                }
            }
        }
    }

    state::save_state(cfg.build_dir, &build_state)?;
    result.total_duration = start.elapsed();
    info!(
        executed = result.executed,
        up_to_date = result.up_to_date,
        failed = result.failed,
        skipped = result.skipped,
        seconds = result.total_duration.as_secs_f64(),
        "run complete"
    );
    Ok(result)
}

fn skipped(reason: &str) -> TaskStatus {
    TaskStatus::Skipped {
        reason: reason.to_string(),
    }
}

struct Runner<'a> {
    cfg: &'a RunConfig<'a>,
    /// Extraction task path → executable
    executables: HashMap<String, PathBuf>,
    /// Task path → output fingerprint of this run or a previous one
    output_hashes: HashMap<String, String>,
}

impl Runner<'_> {
    fn run_item(&mut self, item: &WorkItem, build_state: &mut BuildState) -> Result<TaskStatus> {
        if matches!(item.action, Action::Lifecycle | Action::External) {
            self.output_hashes
                .insert(item.path.clone(), hasher::hash_string(&item.path));
            return Ok(TaskStatus::NoWork);
        }

        let fingerprint = hasher::fingerprint(item, &self.output_hashes)?;
        if !self.cfg.force {
            if let Some(record) = build_state.record(&item.path) {
                if is_up_to_date(item, record, &fingerprint) {
                    debug!(task = %item.path, "up to date");
                    self.output_hashes
                        .insert(item.path.clone(), record.outputs.clone());
                    return Ok(TaskStatus::UpToDate);
                }
            }
        }

        info!(task = %item.path, "executing");
        self.perform(item)?;

        let outputs = output_fingerprint(item, &fingerprint)?;
        self.output_hashes.insert(item.path.clone(), outputs.clone());
        build_state.tasks.insert(
            item.path.clone(),
            TaskRecord {
                fingerprint,
                outputs,
                duration_seconds: None,
            },
        );
        Ok(TaskStatus::Executed)
    }

    fn perform(&mut self, item: &WorkItem) -> Result<()> {
        match &item.action {
            Action::Lifecycle | Action::External => Ok(()),
            Action::CopySources {
                from,
                extension,
                into,
            } => copy_sources(from, extension, into),
            Action::Extract {
                coordinate,
                executable,
                into,
            } => {
                let exe = self.cfg.extractor.materialize(coordinate, executable)?;
                std::fs::create_dir_all(into).map_err(|e| Error::io("cannot create dir", into, e))?;
                let pointer = into.join(EXECUTABLE_POINTER);
                std::fs::write(&pointer, exe.to_string_lossy().as_bytes())
                    .map_err(|e| Error::io("cannot write", &pointer, e))?;
                self.executables.insert(item.path.clone(), exe);
                Ok(())
            }
            Action::CompileIr {
                extract_task,
                input_dir,
                output_file,
                extensions,
            } => {
                let exe = self.executable_for(extract_task)?;
                let parent = output_file.parent().unwrap_or(Path::new("."));
                std::fs::create_dir_all(parent).map_err(|e| Error::io("cannot create dir", parent, e))?;
                let mut args = vec![
                    "compile".to_string(),
                    input_dir.display().to_string(),
                    output_file.display().to_string(),
                ];
                if let Some(ext) = extensions {
                    args.push("--extensions".to_string());
                    args.push(ext.to_string());
                }
                exec_checked(item, &exe.to_string_lossy(), &args, parent)
            }
            Action::Generate {
                extract_task,
                ir_file,
                output_dir,
                options,
            } => {
                let exe = self.executable_for(extract_task)?;
                clear_dir(output_dir)?;
                let mut args = vec![
                    "generate".to_string(),
                    ir_file.display().to_string(),
                    output_dir.display().to_string(),
                ];
                args.extend(options.to_args());
                exec_checked(item, &exe.to_string_lossy(), &args, output_dir)
            }
            Action::WriteFile { path, contents } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Error::io("cannot create dir", parent, e))?;
                }
                std::fs::write(path, contents).map_err(|e| Error::io("cannot write", path, e))
            }
            Action::Exec {
                program,
                args,
                working_dir,
            } => exec_checked(item, program, args, working_dir),
            Action::Delete { targets } => {
                for target in targets {
                    remove_path(target)?;
                }
                Ok(())
            }
        }
    }

    /// Executable produced by an extraction item in this run or a previous one.
    fn executable_for(&mut self, extract_task: &str) -> Result<PathBuf> {
        if let Some(exe) = self.executables.get(extract_task) {
            return Ok(exe.clone());
        }
        let item = self
            .cfg
            .build
            .graph
            .get(extract_task)
            .ok_or_else(|| Error::UnknownTask(extract_task.to_string()))?;
        let Action::Extract { into, .. } = &item.action else {
            return Err(Error::TaskFailed {
                task: extract_task.to_string(),
                message: "not an extraction task".to_string(),
            });
        };
        let exe = read_executable_pointer(into)?;
        self.executables.insert(extract_task.to_string(), exe.clone());
        Ok(exe)
    }
}

/// Executable path recorded by an extraction into `into`.
fn read_executable_pointer(into: &Path) -> Result<PathBuf> {
    let pointer = into.join(EXECUTABLE_POINTER);
    std::fs::read_to_string(&pointer)
        .map(|s| PathBuf::from(s.trim()))
        .map_err(|e| Error::io("cannot read", &pointer, e))
}

fn is_up_to_date(item: &WorkItem, record: &TaskRecord, fingerprint: &str) -> bool {
    // Items without declared outputs always run.
    if record.fingerprint != fingerprint
        || item.outputs.is_empty()
        || !item.outputs.iter().all(|o| o.exists())
    {
        return false;
    }
    // The pointer outlives the cache it points into.
    match &item.action {
        Action::Extract { into, .. } => read_executable_pointer(into).is_ok_and(|exe| exe.is_file()),
        _ => true,
    }
}

fn output_fingerprint(item: &WorkItem, fingerprint: &str) -> Result<String> {
    if item.outputs.is_empty() {
        return Ok(fingerprint.to_string());
    }
    let parts = item
        .outputs
        .iter()
        .map(|o| hasher::hash_path(o))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    Ok(hasher::composite_hash(&refs))
}

fn exec_checked(item: &WorkItem, program: &str, args: &[String], cwd: &Path) -> Result<()> {
    let out = transport::exec_command(program, args, cwd)?;
    if out.success() {
        return Ok(());
    }
    Err(Error::TaskFailed {
        task: item.path.clone(),
        message: out.failure_message(),
    })
}

/// Mirror `from/**/*.{extension}` into a cleared `into`.
fn copy_sources(from: &Path, extension: &str, into: &Path) -> Result<()> {
    clear_dir(into)?;
    if !from.is_dir() {
        warn!(dir = %from.display(), "source directory missing; nothing to stage");
        return Ok(());
    }
    let pattern = format!("{}/**/*.{}", from.display(), extension);
    let entries = glob::glob(&pattern)
        .map_err(|e| Error::Manifest(format!("bad source pattern {}: {}", pattern, e)))?;
    for entry in entries {
        let source = entry.map_err(|e| Error::io("cannot read", e.path().to_path_buf(), e.into_error()))?;
        if !source.is_file() {
            continue;
        }
        let rel = source.strip_prefix(from).unwrap_or(&source);
        let dest = into.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("cannot create dir", parent, e))?;
        }
        std::fs::copy(&source, &dest).map_err(|e| Error::io("cannot copy", &source, e))?;
    }
    Ok(())
}

fn clear_dir(dir: &Path) -> Result<()> {
    remove_path(dir)?;
    std::fs::create_dir_all(dir).map_err(|e| Error::io("cannot create dir", dir, e))
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else if path.exists() {
        std::fs::remove_file(path)
    } else {
        return Ok(());
    };
    result.map_err(|e| Error::io("cannot remove", path, e))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::orchestrator::{configure_manifest, ConfiguredBuild};
    use crate::extract::RepositoryExtractor;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_TOOL: &str = r#"#!/bin/sh
case "$1" in
  compile) mkdir -p "$(dirname "$3")"; cat "$2"/*.yml > "$3" ;;
  generate) mkdir -p "$3"; cp "$2" "$3/ir.json"; echo "$@" > "$3/args.txt" ;;
esac
"#;

    const FAILING_TOOL: &str = "#!/bin/sh\necho 'generator exploded' >&2\nexit 3\n";

    /// Extractor serving scripts from a directory, keyed by coordinate name.
    struct ScriptExtractor {
        dir: PathBuf,
    }

    impl ExecutableExtractor for ScriptExtractor {
        fn materialize(&self, coordinate: &Coordinate, _executable: &str) -> Result<PathBuf> {
            let specific = self.dir.join(&coordinate.name);
            if specific.is_file() {
                return Ok(specific);
            }
            Ok(self.dir.join("default"))
        }
    }

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, body).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct Fixture {
        dir: tempfile::TempDir,
        build: ConfiguredBuild,
        extractor: ScriptExtractor,
    }

    impl Fixture {
        fn new(failing_rust: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let tools = dir.path().join("tools");
            std::fs::create_dir_all(&tools).unwrap();
            write_script(&tools.join("default"), FAKE_TOOL);
            if failing_rust {
                write_script(&tools.join("conjure-rust"), FAILING_TOOL);
            }
            let src = dir.path().join("src/main/conjure");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join("api.yml"), "types: {}\n").unwrap();
            std::fs::write(src.join("notes.txt"), "ignored\n").unwrap();

            let manifest: Manifest = serde_yaml_ng::from_str(
                "root: foo\nunits:\n  foo-objects: {}\n  foo-rust: {}\ngenerators:\n  - com.example:conjure-rust:0.3.0\n",
            )
            .unwrap();
            let project = Project::from_manifest(&manifest, dir.path());
            let build = configure_manifest(&manifest, &project).unwrap();
            Self {
                extractor: ScriptExtractor { dir: tools },
                dir,
                build,
            }
        }

        fn run(&self, force: bool, dry_run: bool, policy: FailurePolicy) -> RunResult {
            let targets = vec![":foo:compileConjure".to_string()];
            let build_dir = self.dir.path().join("build");
            run(&RunConfig {
                build: &self.build,
                build_dir: &build_dir,
                extractor: &self.extractor,
                targets: &targets,
                force,
                dry_run,
                failure_policy: policy,
            })
            .unwrap()
        }
    }

    #[test]
    fn test_cj012_dry_run_touches_nothing() {
        let f = Fixture::new(false);
        let result = f.run(false, true, FailurePolicy::StopOnFirst);
        assert!(result.reports.iter().all(|r| r.status == TaskStatus::Planned));
        assert_eq!(result.reports.last().unwrap().task, ":foo:compileConjure");
        assert!(!f.dir.path().join("build").exists());
    }

    #[test]
    fn test_cj012_run_generates_everything() {
        let f = Fixture::new(false);
        let result = f.run(false, false, FailurePolicy::StopOnFirst);
        assert!(result.success(), "{:?}", result.reports);

        let root = f.dir.path();
        assert!(root.join("build/conjure/api.yml").is_file());
        assert!(!root.join("build/conjure/notes.txt").exists());
        assert_eq!(
            std::fs::read_to_string(root.join("build/conjure-ir/foo.conjure.json")).unwrap(),
            "types: {}\n"
        );
        let args = std::fs::read_to_string(root.join("foo-objects/src/generated/java/args.txt")).unwrap();
        assert!(args.contains("--objects"));
        assert!(root.join("foo-rust/src/ir.json").is_file());
        assert_eq!(
            std::fs::read_to_string(root.join("foo-objects/.gitignore")).unwrap(),
            "/src/generated/java/\n"
        );
        assert!(root.join("build/conjurer-state.yaml").is_file());
        assert_eq!(result.status_of(":foo:compileConjure"), Some(&TaskStatus::NoWork));
    }

    #[test]
    fn test_cj012_second_run_is_up_to_date() {
        let f = Fixture::new(false);
        f.run(false, false, FailurePolicy::StopOnFirst);
        let second = f.run(false, false, FailurePolicy::StopOnFirst);
        assert_eq!(second.executed, 0, "{:?}", second.reports);
        assert!(second.up_to_date > 0);

        // Touching a definition re-runs staging, IR and generation.
        std::fs::write(f.dir.path().join("src/main/conjure/api.yml"), "types: {x: 1}\n").unwrap();
        let third = f.run(false, false, FailurePolicy::StopOnFirst);
        assert_eq!(third.status_of(":foo:compileIr"), Some(&TaskStatus::Executed));
        assert_eq!(third.status_of(":foo:compileConjureRust"), Some(&TaskStatus::Executed));
        assert_eq!(third.status_of(":foo:extractConjure"), Some(&TaskStatus::UpToDate));
    }

    #[test]
    fn test_cj012_force_reruns() {
        let f = Fixture::new(false);
        f.run(false, false, FailurePolicy::StopOnFirst);
        let forced = f.run(true, false, FailurePolicy::StopOnFirst);
        assert_eq!(forced.up_to_date, 0);
        assert_eq!(forced.status_of(":foo:compileIr"), Some(&TaskStatus::Executed));
    }

    #[test]
    fn test_cj012_stop_on_first_failure() {
        let f = Fixture::new(true);
        let result = f.run(false, false, FailurePolicy::StopOnFirst);
        assert_eq!(result.failed, 1);
        assert!(!result.success());
        match result.status_of(":foo:compileConjureRust") {
            Some(TaskStatus::Failed { message }) => assert!(message.contains("generator exploded")),
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(matches!(
            result.status_of(":foo:compileConjure"),
            Some(TaskStatus::Skipped { .. })
        ));
        assert!(matches!(result.first_failure(), Some(Error::TaskFailed { .. })));
    }

    #[test]
    fn test_cj012_continue_independent() {
        let f = Fixture::new(true);
        let result = f.run(false, false, FailurePolicy::ContinueIndependent);
        assert_eq!(result.failed, 1);
        assert_eq!(
            result.status_of(":foo:compileConjureObjects"),
            Some(&TaskStatus::Executed)
        );
        assert!(matches!(
            result.status_of(":foo:compileConjure"),
            Some(TaskStatus::Skipped { .. })
        ));
        // The failed item is not recorded, so the next run retries it.
        let state = state::load_state(&f.dir.path().join("build")).unwrap().unwrap();
        assert!(state.record(":foo:compileConjureRust").is_none());
        assert!(state.record(":foo:compileConjureObjects").is_some());
    }

    #[test]
    fn test_cj012_clean_removes_outputs() {
        let f = Fixture::new(false);
        f.run(false, false, FailurePolicy::StopOnFirst);
        let targets = vec![":foo:clean".to_string()];
        let build_dir = f.dir.path().join("build");
        run(&RunConfig {
            build: &f.build,
            build_dir: &build_dir,
            extractor: &f.extractor,
            targets: &targets,
            force: false,
            dry_run: false,
            failure_policy: FailurePolicy::StopOnFirst,
        })
        .unwrap();
        assert!(!f.dir.path().join("foo-objects/src/generated/java").exists());
        assert!(!f.dir.path().join("foo-rust/src").exists());
    }

    fn write_distribution(extractor: &RepositoryExtractor, coordinate: &Coordinate, body: &str) {
        let archive = extractor.archive_path(coordinate).unwrap();
        std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
        let file = std::fs::File::create(&archive).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        let inner = format!(
            "{}-{}/bin/{}",
            coordinate.name,
            coordinate.version.as_deref().unwrap(),
            coordinate.name
        );
        builder.append_data(&mut header, inner, body.as_bytes()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_cj012_clean_then_run_reextracts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let src = root.join("src/main/conjure");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("api.yml"), "types: {}\n").unwrap();

        // Cache under the root build dir, as the CLI default does.
        let extractor = RepositoryExtractor::new(root.join("repository"), root.join("build/conjurer-cache"));
        write_distribution(&extractor, &Coordinate::parse("com.palantir.conjure:conjure:4.13.0").unwrap(), FAKE_TOOL);
        write_distribution(&extractor, &Coordinate::parse("com.example:conjure-rust:0.3.0").unwrap(), FAKE_TOOL);

        let manifest: Manifest = serde_yaml_ng::from_str(
            "root: foo\nunits:\n  foo-rust: {}\ngenerators:\n  - com.example:conjure-rust:0.3.0\nversions:\n  com.palantir.conjure:conjure: 4.13.0\n",
        )
        .unwrap();
        let project = Project::from_manifest(&manifest, root);
        let build = configure_manifest(&manifest, &project).unwrap();
        let build_dir = root.join("build");
        let run_target = |target: &str| {
            let targets = vec![target.to_string()];
            run(&RunConfig {
                build: &build,
                build_dir: &build_dir,
                extractor: &extractor,
                targets: &targets,
                force: false,
                dry_run: false,
                failure_policy: FailurePolicy::StopOnFirst,
            })
            .unwrap()
        };

        let first = run_target(":foo:compileConjure");
        assert!(first.success(), "{:?}", first.reports);
        assert!(root.join("foo-rust/build/generator/executable.path").is_file());

        run_target(":foo:clean");
        assert!(!root.join("build/conjurer-cache").exists());
        assert!(!root.join("foo-rust/build/generator").exists());

        let again = run_target(":foo:compileConjure");
        assert!(again.success(), "{:?}", again.reports);
        assert_eq!(again.status_of(":foo:extractConjureRust"), Some(&TaskStatus::Executed));
        assert_eq!(again.status_of(":foo:compileConjureRust"), Some(&TaskStatus::Executed));
        assert!(root.join("foo-rust/src/ir.json").is_file());
    }

    #[test]
    fn test_cj012_extraction_pointing_at_missing_executable_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let into = dir.path().join("generator");
        std::fs::create_dir_all(&into).unwrap();
        let exe = dir.path().join("cache/bin/conjure-rust");
        std::fs::write(into.join(EXECUTABLE_POINTER), exe.to_string_lossy().as_bytes()).unwrap();

        let item = WorkItem::new(
            "foo",
            "extractConjureRust",
            Action::Extract {
                coordinate: Coordinate::parse("com.example:conjure-rust:0.3.0").unwrap(),
                executable: "conjure-rust".to_string(),
                into: into.clone(),
            },
        )
        .output(into);
        let record = TaskRecord {
            fingerprint: "blake3:same".to_string(),
            outputs: "blake3:out".to_string(),
            duration_seconds: None,
        };
        assert!(!is_up_to_date(&item, &record, "blake3:same"));

        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        write_script(&exe, FAKE_TOOL);
        assert!(is_up_to_date(&item, &record, "blake3:same"));
        assert!(!is_up_to_date(&item, &record, "blake3:other"));
    }

    #[test]
    fn test_cj012_unknown_target() {
        let f = Fixture::new(false);
        let targets = vec![":foo:nope".to_string()];
        let build_dir = f.dir.path().join("build");
        let err = run(&RunConfig {
            build: &f.build,
            build_dir: &build_dir,
            extractor: &f.extractor,
            targets: &targets,
            force: false,
            dry_run: false,
            failure_policy: FailurePolicy::StopOnFirst,
        })
        .unwrap_err();
        assert!(matches!(err, Error::UnknownTask(_)));
    }

    #[test]
    fn test_cj012_remove_path_variants() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();
        remove_path(&file).unwrap();
        assert!(!file.exists());
        remove_path(&dir.path().join("missing")).unwrap();
        clear_dir(&dir.path().join("a/b")).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}
