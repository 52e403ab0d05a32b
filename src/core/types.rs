//! CJ-001: Core types — manifest schema, build topology, coordinates,
//! generator options, work items, and per-unit configuration records.
//!
//! Manifest types derive Serialize/Deserialize for YAML roundtripping.
//! Graph types derive Serialize so plans can be emitted as JSON.

use super::error::{Error, Result};
use super::naming::FirstClassKind;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Workspace manifest (conjure.yaml)
// ============================================================================

/// Root manifest: the topology of one conjure definition project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the root unit holding the IDL sources
    pub root: String,

    /// Plugins applied to the root unit (e.g. `idea`, `eclipse`)
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Tasks the surrounding build already defines on the root unit
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Child units (order-preserving)
    #[serde(default)]
    pub units: IndexMap<String, UnitDecl>,

    /// Custom generator dependencies (`group:conjure-<lang>:version`)
    #[serde(default)]
    pub generators: Vec<String>,

    /// Versions for built-in tool coordinates, keyed by `group:name`
    #[serde(default)]
    pub versions: IndexMap<String, String>,

    /// Generator options
    #[serde(default)]
    pub options: OptionsDecl,

    /// Recommended product dependencies embedded into the IR
    #[serde(default)]
    pub product_dependencies: Vec<ProductDependency>,

    /// Local directory holding tool distributions
    #[serde(default)]
    pub repository: Option<PathBuf>,

    /// Override for the extracted-executable cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Execution policy
    #[serde(default)]
    pub policy: Policy,
}

/// A child unit declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitDecl {
    /// Directory relative to the manifest (defaults to the unit name)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Plugins applied to this unit
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Tasks the surrounding build already defines on this unit
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Generator option blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsDecl {
    #[serde(default)]
    pub java: GeneratorOptions,

    #[serde(default)]
    pub typescript: GeneratorOptions,

    #[serde(default)]
    pub python: GeneratorOptions,

    /// Per-language options for generic generators
    #[serde(default)]
    pub generic: BTreeMap<String, GeneratorOptions>,
}

impl OptionsDecl {
    /// Options for a generic language (empty when none declared).
    pub fn generic_for(&self, language: &str) -> GeneratorOptions {
        self.generic.get(language).cloned().unwrap_or_default()
    }
}

/// A recommended product dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductDependency {
    #[serde(alias = "product_group")]
    pub product_group: String,

    #[serde(alias = "product_name")]
    pub product_name: String,

    #[serde(alias = "minimum_version")]
    pub minimum_version: String,

    #[serde(alias = "maximum_version")]
    pub maximum_version: String,

    #[serde(default, alias = "recommended_version", skip_serializing_if = "Option::is_none")]
    pub recommended_version: Option<String>,
}

/// Execution policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Failure handling
    #[serde(default)]
    pub failure: FailurePolicy,
}

/// Failure handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    ContinueIndependent,
}

// ============================================================================
// Build topology
// ============================================================================

/// A buildable subtree of the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildUnit {
    pub name: String,
    pub dir: PathBuf,
    /// Parent unit name; `None` for the root
    pub parent: Option<String>,
    pub plugins: BTreeSet<String>,
    pub tasks: BTreeSet<String>,
}

impl BuildUnit {
    /// Build output directory of this unit.
    pub fn build_dir(&self) -> PathBuf {
        self.dir.join("build")
    }

    /// Resolve a path relative to the unit directory.
    pub fn file(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }

    pub fn has_plugin(&self, plugin: &str) -> bool {
        self.plugins.contains(plugin)
    }

    pub fn has_task(&self, task: &str) -> bool {
        self.tasks.contains(task)
    }
}

/// The root unit and its ordered children.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub root: BuildUnit,
    pub children: IndexMap<String, BuildUnit>,
}

impl Project {
    /// Build the topology from a manifest located in `base_dir`.
    pub fn from_manifest(manifest: &Manifest, base_dir: &Path) -> Self {
        let root = BuildUnit {
            name: manifest.root.clone(),
            dir: base_dir.to_path_buf(),
            parent: None,
            plugins: manifest.plugins.iter().cloned().collect(),
            tasks: manifest.tasks.iter().cloned().collect(),
        };
        let children = manifest
            .units
            .iter()
            .map(|(name, decl)| {
                let dir = decl
                    .dir
                    .as_ref()
                    .map(|d| base_dir.join(d))
                    .unwrap_or_else(|| base_dir.join(name));
                let unit = BuildUnit {
                    name: name.clone(),
                    dir,
                    parent: Some(manifest.root.clone()),
                    plugins: decl.plugins.iter().cloned().collect(),
                    tasks: decl.tasks.iter().cloned().collect(),
                };
                (name.clone(), unit)
            })
            .collect();
        Self { root, children }
    }

    /// Find a child unit by name.
    pub fn find(&self, name: &str) -> Option<&BuildUnit> {
        self.children.get(name)
    }
}

// ============================================================================
// Coordinates
// ============================================================================

/// A dependency coordinate: `group:name[:version][@ext]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl Coordinate {
    /// Parse `group:name[:version][@ext]`.
    pub fn parse(s: &str) -> Result<Self> {
        let (body, extension) = match s.split_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, Some(ext.to_string())),
            Some(_) => return Err(Error::InvalidCoordinate(s.to_string())),
            None => (s, None),
        };
        let parts: Vec<&str> = body.split(':').collect();
        if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::InvalidCoordinate(s.to_string()));
        }
        Ok(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts.get(2).map(|v| v.to_string()),
            extension,
        })
    }

    /// `group:name` without version or extension.
    pub fn module(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// Return a copy pinned to `version` unless one is already set.
    pub fn with_default_version(mut self, version: Option<&String>) -> Self {
        if self.version.is_none() {
            self.version = version.cloned();
        }
        self
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if let Some(ref v) = self.version {
            write!(f, ":{}", v)?;
        }
        if let Some(ref ext) = self.extension {
            write!(f, "@{}", ext)?;
        }
        Ok(())
    }
}

// ============================================================================
// Generator options
// ============================================================================

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// Key/value options passed to a generator. Sorted for stable rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorOptions(pub BTreeMap<String, OptionValue>);

impl GeneratorOptions {
    /// Copy of these options with `flag` set to `true`.
    pub fn with_flag(&self, flag: &str) -> Self {
        self.with(flag, OptionValue::Bool(true))
    }

    /// Copy of these options with `key` set to `value`.
    pub fn with(&self, key: &str, value: OptionValue) -> Self {
        let mut copy = self.clone();
        copy.0.insert(key.to_string(), value);
        copy
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Render as command-line arguments: `--flag` for `true`, nothing for
    /// `false`, `--key=value` otherwise.
    pub fn to_args(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|(key, value)| match value {
                OptionValue::Bool(true) => Some(format!("--{}", key)),
                OptionValue::Bool(false) => None,
                other => Some(format!("--{}={}", key, other)),
            })
            .collect()
    }
}

// ============================================================================
// Language mapping
// ============================================================================

/// Resolved pairing of a unit to a generation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum LanguageMapping {
    FirstClass(FirstClassKind),
    Generic(String),
}

impl LanguageMapping {
    pub fn language(&self) -> &str {
        match self {
            Self::FirstClass(kind) => kind.suffix(),
            Self::Generic(language) => language,
        }
    }
}

// ============================================================================
// Work items
// ============================================================================

/// Qualified task path: `:unit:name`.
pub fn task_path(unit: &str, name: &str) -> String {
    format!(":{}:{}", unit, name)
}

/// What a work item does when executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Aggregate with no action of its own
    Lifecycle,
    /// Owned by the surrounding build; executed elsewhere
    External,
    /// Mirror `*.{extension}` files from `from` into a cleared `into`
    CopySources {
        from: PathBuf,
        extension: String,
        into: PathBuf,
    },
    /// Materialize an executable distribution
    Extract {
        coordinate: Coordinate,
        executable: String,
        into: PathBuf,
    },
    /// Compile staged definitions into one IR file
    CompileIr {
        extract_task: String,
        input_dir: PathBuf,
        output_file: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        extensions: Option<serde_json::Value>,
    },
    /// Run a generator over the IR into a cleared output directory
    Generate {
        extract_task: String,
        ir_file: PathBuf,
        output_dir: PathBuf,
        options: GeneratorOptions,
    },
    /// Write a small file (gitignore markers, dependency manifests)
    WriteFile { path: PathBuf, contents: String },
    /// Run an external program
    Exec {
        program: String,
        args: Vec<String>,
        working_dir: PathBuf,
    },
    /// Remove files or directories
    Delete { targets: Vec<PathBuf> },
}

/// A declared input of a work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TaskInput {
    File(PathBuf),
    Dir(PathBuf),
    TaskOutput(String),
    Options(GeneratorOptions),
    Property(String, String),
}

/// A named, orderable unit of build work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    pub path: String,
    pub name: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub action: Action,
    pub inputs: Vec<TaskInput>,
    pub outputs: Vec<PathBuf>,
    pub depends_on: IndexSet<String>,
}

impl WorkItem {
    /// A new work item with no inputs, outputs or dependencies.
    pub fn new(unit: &str, name: &str, action: Action) -> Self {
        Self {
            path: task_path(unit, name),
            name: name.to_string(),
            unit: unit.to_string(),
            group: None,
            description: None,
            action,
            inputs: Vec::new(),
            outputs: Vec::new(),
            depends_on: IndexSet::new(),
        }
    }

    pub fn grouped(mut self, group: &str, description: &str) -> Self {
        self.group = Some(group.to_string());
        self.description = Some(description.to_string());
        self
    }

    pub fn input(mut self, input: TaskInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: PathBuf) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn after(mut self, upstream: &str) -> Self {
        self.depends_on.insert(upstream.to_string());
        self
    }
}

// ============================================================================
// Per-unit configuration
// ============================================================================

/// Dependency scope on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyScope {
    Api,
    CompileOnly,
}

/// What a unit depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum DependencyTarget {
    Library(Coordinate),
    Unit(String),
}

/// A library or unit dependency added to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryDependency {
    pub scope: DependencyScope,
    pub target: DependencyTarget,
}

/// IDEA module model additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdeaModule {
    pub source_dirs: Vec<PathBuf>,
    pub generated_source_dirs: Vec<PathBuf>,
}

/// Everything wiring decided about one unit besides its work items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitConfiguration {
    pub unit: String,
    pub mapping: LanguageMapping,
    pub applied_plugins: Vec<String>,
    pub source_dirs: Vec<PathBuf>,
    pub dependencies: Vec<LibraryDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idea: Option<IdeaModule>,
    pub ignored_unused_dependencies: Vec<String>,
    pub manifest_attributes: BTreeMap<String, String>,
}

impl UnitConfiguration {
    pub fn new(unit: &str, mapping: LanguageMapping) -> Self {
        Self {
            unit: unit.to_string(),
            mapping,
            applied_plugins: Vec::new(),
            source_dirs: Vec::new(),
            dependencies: Vec::new(),
            idea: None,
            ignored_unused_dependencies: Vec::new(),
            manifest_attributes: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cj001_manifest_parse() {
        let yaml = r#"
root: api
plugins: [idea]
units:
  api-objects: {}
  api-typescript:
    tasks: [publish]
  api-rust:
    dir: rust
generators:
  - com.example:conjure-rust:0.3.0
versions:
  com.palantir.conjure:conjure: 4.13.0
options:
  java:
    useImmutableBytes: true
  generic:
    rust:
      crateVersion: 1.2.3
product_dependencies:
  - product_group: com.example
    product_name: backend
    minimum_version: 1.0.0
    maximum_version: 1.x.x
policy:
  failure: continue_independent
"#;
        let m: Manifest = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(m.root, "api");
        assert_eq!(m.units.len(), 3);
        assert_eq!(m.units["api-typescript"].tasks, vec!["publish"]);
        assert_eq!(m.generators.len(), 1);
        assert_eq!(
            m.options.java.get("useImmutableBytes"),
            Some(&OptionValue::Bool(true))
        );
        assert_eq!(
            m.options.generic_for("rust").get("crateVersion"),
            Some(&OptionValue::String("1.2.3".to_string()))
        );
        assert!(m.options.generic_for("go").0.is_empty());
        assert_eq!(m.product_dependencies[0].product_name, "backend");
        assert_eq!(m.policy.failure, FailurePolicy::ContinueIndependent);
    }

    #[test]
    fn test_cj001_manifest_defaults() {
        let m: Manifest = serde_yaml_ng::from_str("root: api\n").unwrap();
        assert!(m.units.is_empty());
        assert!(m.generators.is_empty());
        assert!(m.repository.is_none());
        assert_eq!(m.policy.failure, FailurePolicy::StopOnFirst);
    }

    #[test]
    fn test_cj001_project_from_manifest() {
        let m: Manifest = serde_yaml_ng::from_str(
            "root: api\nunits:\n  api-objects: {}\n  api-rust:\n    dir: gen/rust\n    plugins: [idea]\n",
        )
        .unwrap();
        let p = Project::from_manifest(&m, Path::new("/ws"));
        assert_eq!(p.root.dir, PathBuf::from("/ws"));
        assert_eq!(p.root.parent, None);
        let objects = p.find("api-objects").unwrap();
        assert_eq!(objects.dir, PathBuf::from("/ws/api-objects"));
        assert_eq!(objects.parent.as_deref(), Some("api"));
        let rust = p.find("api-rust").unwrap();
        assert_eq!(rust.dir, PathBuf::from("/ws/gen/rust"));
        assert!(rust.has_plugin("idea"));
        assert_eq!(rust.build_dir(), PathBuf::from("/ws/gen/rust/build"));
        let names: Vec<_> = p.children.keys().collect();
        assert_eq!(names, vec!["api-objects", "api-rust"]);
    }

    #[test]
    fn test_cj001_coordinate_parse() {
        let c = Coordinate::parse("com.palantir.conjure.typescript:conjure-typescript@tgz").unwrap();
        assert_eq!(c.group, "com.palantir.conjure.typescript");
        assert_eq!(c.name, "conjure-typescript");
        assert_eq!(c.version, None);
        assert_eq!(c.extension.as_deref(), Some("tgz"));

        let c = Coordinate::parse("com.example:conjure-rust:0.3.0").unwrap();
        assert_eq!(c.version.as_deref(), Some("0.3.0"));
        assert_eq!(c.to_string(), "com.example:conjure-rust:0.3.0");
        assert_eq!(c.module(), "com.example:conjure-rust");
    }

    #[test]
    fn test_cj001_coordinate_parse_rejects_garbage() {
        for bad in ["", "justname", "a:b:c:d", ":name", "group:", "a:b@"] {
            assert!(
                matches!(Coordinate::parse(bad), Err(Error::InvalidCoordinate(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_cj001_coordinate_default_version() {
        let v = "1.0.0".to_string();
        let c = Coordinate::parse("g:n").unwrap().with_default_version(Some(&v));
        assert_eq!(c.to_string(), "g:n:1.0.0");
        let c = Coordinate::parse("g:n:2.0.0").unwrap().with_default_version(Some(&v));
        assert_eq!(c.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_cj001_options_render_args() {
        let opts = GeneratorOptions::default()
            .with("packageName", OptionValue::String("foo".into()))
            .with("strict", OptionValue::Bool(false))
            .with_flag("objects");
        assert_eq!(opts.to_args(), vec!["--objects", "--packageName=foo"]);
    }

    #[test]
    fn test_cj001_options_with_flag_does_not_mutate_original() {
        let base = GeneratorOptions::default();
        let flagged = base.with_flag("jersey");
        assert!(base.0.is_empty());
        assert_eq!(flagged.get("jersey"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_cj001_work_item_builder() {
        let item = WorkItem::new("api", "compileIr", Action::Lifecycle)
            .grouped("Conjure", "desc")
            .after(":api:extractConjure")
            .after(":api:extractConjure")
            .output(PathBuf::from("/out"));
        assert_eq!(item.path, ":api:compileIr");
        assert_eq!(item.depends_on.len(), 1);
        assert_eq!(item.group.as_deref(), Some("Conjure"));
        assert_eq!(item.outputs, vec![PathBuf::from("/out")]);
    }

    #[test]
    fn test_cj001_language_mapping() {
        assert_eq!(LanguageMapping::FirstClass(FirstClassKind::Python).language(), "python");
        assert_eq!(LanguageMapping::Generic("rust".into()).language(), "rust");
    }

    #[test]
    fn test_cj001_product_dependency_serializes_kebab() {
        let pd = ProductDependency {
            product_group: "g".into(),
            product_name: "n".into(),
            minimum_version: "1.0.0".into(),
            maximum_version: "1.x.x".into(),
            recommended_version: None,
        };
        let json = serde_json::to_string(&pd).unwrap();
        assert!(json.contains("\"product-group\":\"g\""));
        assert!(!json.contains("recommended"));
    }
}
