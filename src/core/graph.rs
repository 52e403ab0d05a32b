//! CJ-005: Task graph construction and ordering.
//!
//! Work items live in an insertion-ordered map so that building the same
//! topology twice yields identical names, outputs and edges. Ordering uses
//! Kahn's algorithm with alphabetical tie-breaking.

use super::error::{Error, Result};
use super::naming;
use super::types::*;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tracing::debug;

/// Group label for every conjure task.
pub const TASK_GROUP: &str = "Conjure";
/// Aggregate that triggers every generation step.
pub const COMPILE_CONJURE: &str = "compileConjure";
/// Intermediate-representation compilation.
pub const COMPILE_IR: &str = "compileIr";
/// Raw IR compilation without extensions.
pub const RAW_IR: &str = "rawIr";
/// Aggregate clean.
pub const CLEAN: &str = "clean";
/// Source staging.
pub const COPY_SOURCES: &str = "copyConjureSourcesIntoBuild";

/// Conventional IDL source directory of the root unit.
pub const SOURCE_DIR: &str = "src/main/conjure";
/// Only files with this extension are compiled.
pub const SOURCE_EXTENSION: &str = "yml";

// ============================================================================
// Graph
// ============================================================================

/// Directed graph of work items keyed by task path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskGraph {
    items: IndexMap<String, WorkItem>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new work item. Fails if the path is taken.
    pub fn register(&mut self, item: WorkItem) -> Result<String> {
        if self.items.contains_key(&item.path) {
            return Err(Error::DuplicateTask(item.path));
        }
        for upstream in &item.depends_on {
            if !self.items.contains_key(upstream) {
                return Err(Error::UnknownTask(upstream.clone()));
            }
        }
        let path = item.path.clone();
        debug!(task = %path, "registered work item");
        self.items.insert(path.clone(), item);
        Ok(path)
    }

    /// Return the existing item at the path, or register `make()`.
    pub fn ensure(&mut self, path: &str, make: impl FnOnce() -> WorkItem) -> Result<String> {
        if self.items.contains_key(path) {
            return Ok(path.to_string());
        }
        self.register(make())
    }

    /// Append an edge: `downstream` runs after `upstream`.
    pub fn depend(&mut self, downstream: &str, upstream: &str) -> Result<()> {
        if !self.items.contains_key(upstream) {
            return Err(Error::UnknownTask(upstream.to_string()));
        }
        let item = self
            .items
            .get_mut(downstream)
            .ok_or_else(|| Error::UnknownTask(downstream.to_string()))?;
        item.depends_on.insert(upstream.to_string());
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&WorkItem> {
        self.items.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All `(downstream, upstream)` edges in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.items
            .values()
            .flat_map(|item| {
                item.depends_on
                    .iter()
                    .map(move |up| (item.path.as_str(), up.as_str()))
            })
            .collect()
    }

    /// Items that list `path` as a direct dependency.
    pub fn dependents(&self, path: &str) -> Vec<&str> {
        self.items
            .values()
            .filter(|item| item.depends_on.contains(path))
            .map(|item| item.path.as_str())
            .collect()
    }

    /// Whether `upstream` is reachable from `downstream` along dependency edges.
    pub fn depends_transitively(&self, downstream: &str, upstream: &str) -> bool {
        let mut stack: Vec<&str> = vec![downstream];
        let mut seen: IndexSet<&str> = IndexSet::new();
        while let Some(current) = stack.pop() {
            let Some(item) = self.items.get(current) else {
                continue;
            };
            for dep in &item.depends_on {
                if dep == upstream {
                    return true;
                }
                if seen.insert(dep.as_str()) {
                    stack.push(dep.as_str());
                }
            }
        }
        false
    }

    /// The requested tasks plus everything they transitively depend on.
    pub fn closure(&self, targets: &[String]) -> Result<IndexSet<String>> {
        let mut selected: IndexSet<String> = IndexSet::new();
        let mut stack: Vec<String> = Vec::new();
        for target in targets {
            if !self.items.contains_key(target) {
                return Err(Error::UnknownTask(target.clone()));
            }
            stack.push(target.clone());
        }
        while let Some(current) = stack.pop() {
            if !selected.insert(current.clone()) {
                continue;
            }
            if let Some(item) = self.items.get(&current) {
                stack.extend(item.depends_on.iter().cloned());
            }
        }
        Ok(selected)
    }

    /// Topological order over the whole graph.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let all: IndexSet<String> = self.items.keys().cloned().collect();
        self.order_subset(&all)
    }

    /// Topological order over the closure of `targets`.
    pub fn order_for(&self, targets: &[String]) -> Result<Vec<String>> {
        let subset = self.closure(targets)?;
        self.order_subset(&subset)
    }

    /// Kahn's algorithm restricted to `subset`, with sorted tie-breaking.
    fn order_subset(&self, subset: &IndexSet<String>) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for path in subset {
            in_degree.insert(path.as_str(), 0);
            adjacency.insert(path.as_str(), Vec::new());
        }

        for path in subset {
            let item = self
                .items
                .get(path)
                .ok_or_else(|| Error::UnknownTask(path.clone()))?;
            for dep in &item.depends_on {
                if !subset.contains(dep) {
                    continue;
                }
                if let Some(next) = adjacency.get_mut(dep.as_str()) {
                    next.push(path.as_str());
                }
                if let Some(degree) = in_degree.get_mut(path.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut zero_degree: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(path, _)| *path)
            .collect();
        zero_degree.sort_unstable();
        let mut queue: VecDeque<&str> = zero_degree.into_iter().collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());
            let mut next_ready: Vec<&str> = Vec::new();
            if let Some(neighbors) = adjacency.get(current) {
                for &neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            next_ready.push(neighbor);
                        }
                    }
                }
            }
            next_ready.sort_unstable();
            queue.extend(next_ready);
        }

        if order.len() != subset.len() {
            let ordered: IndexSet<&str> = order.iter().map(String::as_str).collect();
            let mut cycle_members: Vec<&str> = subset
                .iter()
                .map(String::as_str)
                .filter(|p| !ordered.contains(p))
                .collect();
            cycle_members.sort_unstable();
            return Err(Error::DependencyCycle(cycle_members.join(", ")));
        }

        Ok(order)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Result of wiring IR compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrCompilation {
    pub task: String,
    pub output_file: PathBuf,
}

/// A generation step to add to the graph.
#[derive(Debug, Clone)]
pub struct GenerationStep<'a> {
    pub unit: &'a str,
    pub name: String,
    pub description: String,
    pub extract_task: String,
    pub output_dir: PathBuf,
    pub options: GeneratorOptions,
}

/// Builds the conjure task graph rooted at one definition unit.
#[derive(Debug)]
pub struct TaskGraphBuilder<'a> {
    root: &'a BuildUnit,
    graph: TaskGraph,
    extractions: IndexMap<Coordinate, String>,
}

impl<'a> TaskGraphBuilder<'a> {
    /// Start a graph with the `compileConjure` and `clean` aggregates.
    pub fn new(root: &'a BuildUnit) -> Result<Self> {
        let mut graph = TaskGraph::new();
        graph.register(
            WorkItem::new(&root.name, COMPILE_CONJURE, Action::Lifecycle).grouped(
                TASK_GROUP,
                "Generates code for your API definitions in src/main/conjure/**/*.yml",
            ),
        )?;
        graph.register(
            WorkItem::new(
                &root.name,
                CLEAN,
                Action::Delete {
                    targets: vec![root.build_dir()],
                },
            )
            .grouped("build", "Deletes the build directory and all generated sources."),
        )?;
        Ok(Self {
            root,
            graph,
            extractions: IndexMap::new(),
        })
    }

    pub fn root(&self) -> &BuildUnit {
        self.root
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut TaskGraph {
        &mut self.graph
    }

    /// Path of an aggregate task on the root unit.
    pub fn root_task(&self, name: &str) -> String {
        task_path(&self.root.name, name)
    }

    /// Register an extraction work item, memoized per coordinate.
    pub fn extract(
        &mut self,
        unit: &str,
        name: &str,
        coordinate: &Coordinate,
        into: PathBuf,
        executable: &str,
    ) -> Result<String> {
        if let Some(existing) = self.extractions.get(coordinate) {
            return Ok(existing.clone());
        }
        let item = WorkItem::new(
            unit,
            name,
            Action::Extract {
                coordinate: coordinate.clone(),
                executable: executable.to_string(),
                into: into.clone(),
            },
        )
        .input(TaskInput::Property("coordinate".to_string(), coordinate.to_string()))
        .output(into);
        let path = self.graph.register(item)?;
        self.extractions.insert(coordinate.clone(), path.clone());
        Ok(path)
    }

    /// Stage sources, extract the compiler and compile the IR.
    pub fn build_ir_compilation(
        &mut self,
        compiler: &Coordinate,
        product_dependencies: &[ProductDependency],
    ) -> Result<IrCompilation> {
        let root_name = self.root.name.clone();
        let source_dir = self.root.file(SOURCE_DIR);
        let staged = self.root.build_dir().join("conjure");

        let copy = self.graph.register(
            WorkItem::new(
                &root_name,
                COPY_SOURCES,
                Action::CopySources {
                    from: source_dir.clone(),
                    extension: SOURCE_EXTENSION.to_string(),
                    into: staged.clone(),
                },
            )
            .input(TaskInput::Dir(source_dir))
            .output(staged.clone()),
        )?;
        self.wire_cleanup(&copy, staged.clone())?;

        let compiler_dir = self.root.build_dir().join("conjureCompiler");
        let extract = self.extract(&root_name, "extractConjure", compiler, compiler_dir, "conjure")?;

        let ir_dir = self.root.build_dir().join("conjure-ir");

        let raw_file = ir_dir.join("rawIr.conjure.json");
        self.graph.register(
            WorkItem::new(
                &root_name,
                RAW_IR,
                Action::CompileIr {
                    extract_task: extract.clone(),
                    input_dir: staged.clone(),
                    output_file: raw_file.clone(),
                    extensions: None,
                },
            )
            .input(TaskInput::TaskOutput(copy.clone()))
            .input(TaskInput::TaskOutput(extract.clone()))
            .output(raw_file)
            .after(&copy)
            .after(&extract),
        )?;

        let extensions = product_dependency_extensions(product_dependencies);
        let output_file = ir_dir.join(format!("{}.conjure.json", root_name));
        let mut compile = WorkItem::new(
            &root_name,
            COMPILE_IR,
            Action::CompileIr {
                extract_task: extract.clone(),
                input_dir: staged,
                output_file: output_file.clone(),
                extensions: extensions.clone(),
            },
        )
        .grouped(
            TASK_GROUP,
            "Converts your Conjure YML files into a single portable JSON file in IR format.",
        )
        .input(TaskInput::TaskOutput(copy.clone()))
        .input(TaskInput::TaskOutput(extract.clone()))
        .output(output_file.clone())
        .after(&copy)
        .after(&extract);
        if let Some(ext) = extensions {
            compile = compile.input(TaskInput::Property(
                "productDependencies".to_string(),
                ext.to_string(),
            ));
        }
        let task = self.graph.register(compile)?;
        Ok(IrCompilation { task, output_file })
    }

    /// Register one generation step depending on IR compilation and its executable.
    pub fn build_generation_step(
        &mut self,
        ir: &IrCompilation,
        step: GenerationStep<'_>,
    ) -> Result<String> {
        let item = WorkItem::new(
            step.unit,
            &step.name,
            Action::Generate {
                extract_task: step.extract_task.clone(),
                ir_file: ir.output_file.clone(),
                output_dir: step.output_dir.clone(),
                options: step.options.clone(),
            },
        )
        .grouped(TASK_GROUP, &step.description)
        .input(TaskInput::TaskOutput(ir.task.clone()))
        .input(TaskInput::TaskOutput(step.extract_task.clone()))
        .input(TaskInput::Options(step.options))
        .output(step.output_dir)
        .after(&ir.task)
        .after(&step.extract_task);
        self.graph.register(item)
    }

    /// Pair a work item with a `clean<Name>` task removing `output_dir`,
    /// owned by the aggregate `clean`.
    pub fn wire_cleanup(&mut self, item: &str, output_dir: PathBuf) -> Result<String> {
        let owner = self
            .graph
            .get(item)
            .ok_or_else(|| Error::UnknownTask(item.to_string()))?;
        let unit = owner.unit.clone();
        let name = naming::lower_camel_case(&format!("clean {}", owner.name));
        let clean = self.graph.register(WorkItem::new(
            &unit,
            &name,
            Action::Delete {
                targets: vec![output_dir],
            },
        ))?;
        let aggregate = self.root_task(CLEAN);
        self.graph.depend(&aggregate, &clean)?;
        Ok(clean)
    }

    /// Make `item` an upstream dependency of `aggregate`.
    pub fn wire_generic_owner(&mut self, aggregate: &str, item: &str) -> Result<()> {
        self.graph.depend(aggregate, item)
    }

    pub fn finish(self) -> TaskGraph {
        self.graph
    }
}

/// IR extension payload carrying recommended product dependencies.
pub fn product_dependency_extensions(deps: &[ProductDependency]) -> Option<serde_json::Value> {
    if deps.is_empty() {
        return None;
    }
    Some(serde_json::json!({ "recommended-product-dependencies": deps }))
}
