//! CJ-008: Orchestrator — discovery, generator resolution and wiring.
//!
//! Configuration runs in a fixed phase order: discover units, finalize
//! generator declarations, resolve generic units, wire first-class units,
//! wire generic units. Any error aborts before a graph is returned.

use super::error::{Error, Result, Warning};
use super::generators::{Declaring, GeneratorSet};
use super::graph::{GenerationStep, TaskGraph, TaskGraphBuilder, COMPILE_CONJURE};
use super::integration::IntegrationRegistry;
use super::naming::{self, FirstClassKind};
use super::types::*;
use super::wiring::{self, WiringContext};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Built-in IR compiler distribution.
pub const COMPILER_COORDINATE: &str = "com.palantir.conjure:conjure";
/// Writes the product dependency file consumed by TypeScript generation.
pub const SERVICE_DEPENDENCIES_TASK: &str = "generateConjureServiceDependencies";
/// Output root of generic generation, relative to the unit.
pub const GENERIC_OUTPUT_DIR: &str = "src";

/// A discovered child unit and the target it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered<'p> {
    pub unit: &'p BuildUnit,
    pub mapping: LanguageMapping,
}

/// Map every child unit to a first-class kind or a generic language.
pub fn discover(project: &Project) -> Result<Vec<Discovered<'_>>> {
    project
        .children
        .values()
        .map(|unit| {
            let language = naming::derive_language(&project.root.name, &unit.name)?;
            let mapping = match FirstClassKind::from_language(&language) {
                Some(kind) => LanguageMapping::FirstClass(kind),
                None => LanguageMapping::Generic(language),
            };
            Ok(Discovered { unit, mapping })
        })
        .collect()
}

/// Result of a successful configuration phase.
#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredBuild {
    pub root: String,
    pub graph: TaskGraph,
    pub units: IndexMap<String, UnitConfiguration>,
    pub warnings: Vec<Warning>,
}

/// Collects declarations for one root unit, then configures it once.
#[derive(Debug)]
pub struct Orchestrator<'p> {
    project: &'p Project,
    generators: GeneratorSet<Declaring>,
    options: OptionsDecl,
    versions: IndexMap<String, String>,
    product_dependencies: Vec<ProductDependency>,
    integrations: IntegrationRegistry,
}

impl<'p> Orchestrator<'p> {
    /// An orchestrator with integrations probed from the project.
    pub fn new(project: &'p Project) -> Self {
        Self {
            project,
            generators: GeneratorSet::new(),
            options: OptionsDecl::default(),
            versions: IndexMap::new(),
            product_dependencies: Vec::new(),
            integrations: IntegrationRegistry::probe(project),
        }
    }

    /// Seed everything the manifest declares.
    pub fn from_manifest(project: &'p Project, manifest: &Manifest) -> Result<Self> {
        let mut orchestrator = Self::new(project)
            .with_options(manifest.options.clone())
            .with_versions(manifest.versions.clone())
            .with_product_dependencies(manifest.product_dependencies.clone());
        for generator in &manifest.generators {
            orchestrator.declare_generator(Coordinate::parse(generator)?);
        }
        Ok(orchestrator)
    }

    pub fn with_options(mut self, options: OptionsDecl) -> Self {
        self.options = options;
        self
    }

    pub fn with_versions(mut self, versions: IndexMap<String, String>) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_product_dependencies(mut self, deps: Vec<ProductDependency>) -> Self {
        self.product_dependencies = deps;
        self
    }

    pub fn with_integrations(mut self, integrations: IntegrationRegistry) -> Self {
        self.integrations = integrations;
        self
    }

    /// Declare a generator dependency. Allowed in any order relative to discovery.
    pub fn declare_generator(&mut self, coordinate: Coordinate) {
        self.generators.declare(coordinate);
    }

    /// Finalize declarations and build the graph.
    pub fn configure(self) -> Result<ConfiguredBuild> {
        let project = self.project;
        let root = &project.root;
        let discovered = discover(project)?;

        let generators = self.generators.finalize()?;
        let generic_pairs: Vec<(&str, &str)> = discovered
            .iter()
            .filter_map(|d| match &d.mapping {
                LanguageMapping::Generic(language) => Some((d.unit.name.as_str(), language.as_str())),
                LanguageMapping::FirstClass(_) => None,
            })
            .collect();
        let resolved = generators.resolve(generic_pairs)?;

        for d in &discovered {
            if let LanguageMapping::FirstClass(kind) = d.mapping {
                wiring::check_sibling(project, d.unit, kind)?;
            }
        }

        let mut builder = TaskGraphBuilder::new(root)?;
        let compiler = Coordinate::parse(COMPILER_COORDINATE)?
            .with_default_version(self.versions.get(COMPILER_COORDINATE));
        let ir = builder.build_ir_compilation(&compiler, &self.product_dependencies)?;

        let service_file = root.build_dir().join("service-dependencies.json");
        let contents = serde_json::to_string_pretty(&self.product_dependencies)
            .map_err(|e| Error::Manifest(format!("cannot encode product dependencies: {}", e)))?;
        let service_task = builder.graph_mut().register(
            WorkItem::new(
                &root.name,
                SERVICE_DEPENDENCIES_TASK,
                Action::WriteFile {
                    path: service_file.clone(),
                    contents,
                },
            )
            .output(service_file.clone()),
        )?;

        let ctx = WiringContext {
            project,
            ir: &ir,
            options: &self.options,
            versions: &self.versions,
            integrations: &self.integrations,
            product_dependencies: &self.product_dependencies,
            service_dependencies: Some((service_task.as_str(), service_file)),
        };

        let mut units = IndexMap::new();
        let mut warnings = Vec::new();
        for d in &discovered {
            if let LanguageMapping::FirstClass(kind) = d.mapping {
                let outcome = wiring::wire_first_class(&mut builder, &ctx, d.unit, kind)?;
                warnings.extend(outcome.warnings);
                units.insert(d.unit.name.clone(), outcome.config);
            }
        }

        for d in &discovered {
            if let LanguageMapping::Generic(ref language) = d.mapping {
                let Some(coordinate) = resolved.get(&d.unit.name) else {
                    continue;
                };
                let config = wire_generic(&mut builder, &ctx, d.unit, language, coordinate)?;
                units.insert(d.unit.name.clone(), config);
            }
        }

        let aggregate = builder.root_task(COMPILE_CONJURE);
        self.integrations
            .ide(&root.name)
            .attach(builder.graph_mut(), root, &aggregate, None, None)?;

        let graph = builder.finish();
        graph.topological_order()?;
        info!(
            root = %root.name,
            units = units.len(),
            tasks = graph.len(),
            warnings = warnings.len(),
            "configuration complete"
        );
        Ok(ConfiguredBuild {
            root: root.name.clone(),
            graph,
            units,
            warnings,
        })
    }
}

/// Extract the resolved generator and generate into the unit's `src`.
fn wire_generic(
    builder: &mut TaskGraphBuilder<'_>,
    ctx: &WiringContext<'_>,
    unit: &BuildUnit,
    language: &str,
    coordinate: &Coordinate,
) -> Result<UnitConfiguration> {
    let root = &ctx.project.root;
    let generator_dir = unit.build_dir().join("generator");
    let extract = builder.extract(
        &root.name,
        &naming::lower_camel_case(&format!("extractConjure {}", language)),
        coordinate,
        generator_dir.clone(),
        &coordinate.name,
    )?;
    // Outside the root build dir, so the aggregate clean misses it.
    builder.wire_cleanup(&extract, generator_dir)?;
    let output_dir: PathBuf = unit.file(GENERIC_OUTPUT_DIR);
    let generate = builder.build_generation_step(
        ctx.ir,
        GenerationStep {
            unit: &root.name,
            name: naming::lower_camel_case(&format!("compileConjure {}", language)),
            description: format!("Generates {} files from your Conjure definition.", language),
            extract_task: extract,
            output_dir: output_dir.clone(),
            options: ctx.options.generic_for(language),
        },
    )?;
    builder.wire_cleanup(&generate, output_dir.clone())?;
    let aggregate = builder.root_task(COMPILE_CONJURE);
    builder.wire_generic_owner(&aggregate, &generate)?;

    let mut config = UnitConfiguration::new(&unit.name, LanguageMapping::Generic(language.to_string()));
    ctx.integrations.ide(&unit.name).attach(
        builder.graph_mut(),
        unit,
        &generate,
        Some(output_dir.as_path()),
        Some(&mut config),
    )?;
    Ok(config)
}

/// Configure the project a manifest describes.
pub fn configure_manifest(manifest: &Manifest, project: &Project) -> Result<ConfiguredBuild> {
    Orchestrator::from_manifest(project, manifest)?.configure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::Path;

    fn project(root: &str, children: &[&str]) -> Project {
        let mut yaml = format!("root: {}\nunits:\n", root);
        for child in children {
            yaml.push_str(&format!("  {}: {{}}\n", child));
        }
        let m: Manifest = serde_yaml_ng::from_str(&yaml).unwrap();
        Project::from_manifest(&m, Path::new("/ws"))
    }

    fn coord(s: &str) -> Coordinate {
        Coordinate::parse(s).unwrap()
    }

    #[test]
    fn test_cj008_discover_maps_units() {
        let p = project("foo", &["foo-objects", "foo-rust", "foo-typescript"]);
        let found = discover(&p).unwrap();
        let mappings: Vec<_> = found.iter().map(|d| (d.unit.name.as_str(), d.mapping.clone())).collect();
        assert_eq!(
            mappings,
            vec![
                ("foo-objects", LanguageMapping::FirstClass(FirstClassKind::Objects)),
                ("foo-rust", LanguageMapping::Generic("rust".into())),
                ("foo-typescript", LanguageMapping::FirstClass(FirstClassKind::Typescript)),
            ]
        );
    }

    #[test]
    fn test_cj008_foreign_child_is_invalid_topology() {
        let p = project("foo", &["bar-objects"]);
        assert!(matches!(
            Orchestrator::new(&p).configure(),
            Err(Error::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_cj008_objects_and_jersey_succeed() {
        let p = project("foo", &["foo-objects", "foo-jersey"]);
        let build = Orchestrator::new(&p).configure().unwrap();
        let aggregate = build.graph.get(":foo:compileConjure").unwrap();
        assert!(aggregate.depends_on.contains(":foo:compileConjureObjects"));
        assert!(aggregate.depends_on.contains(":foo:compileConjureJersey"));
        let jersey = build.graph.get(":foo:compileConjureJersey").unwrap();
        assert!(!jersey.depends_on.contains(":foo:compileConjureObjects"));
        assert!(!build
            .graph
            .depends_transitively(":foo:compileConjureJersey", ":foo:compileConjureObjects"));
        assert_eq!(build.units.len(), 2);
        assert!(build.warnings.is_empty());
    }

    #[test]
    fn test_cj008_missing_generator() {
        let p = project("foo", &["foo-rust"]);
        match Orchestrator::new(&p).configure().unwrap_err() {
            Error::MissingGenerator { unit, expected } => {
                assert_eq!(unit, "foo-rust");
                assert_eq!(expected, "conjure-rust");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cj008_missing_sibling() {
        let p = project("foo", &["foo-dialogue"]);
        match Orchestrator::new(&p).configure().unwrap_err() {
            Error::MissingSibling { unit, sibling } => {
                assert_eq!(unit, "foo-dialogue");
                assert_eq!(sibling, "foo-objects");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cj008_malformed_name_precedes_other_checks() {
        // Both a missing sibling and a missing generator are present too.
        let p = project("foo", &["foo-dialogue", "foo-rust"]);
        let mut o = Orchestrator::new(&p);
        o.declare_generator(coord("com.example:bad-name-objects:1.0.0"));
        assert!(matches!(
            o.configure(),
            Err(Error::MalformedGeneratorName { ref name, .. }) if name == "bad-name-objects"
        ));
    }

    #[test]
    fn test_cj008_generic_wiring() {
        let p = project("foo", &["foo-rust"]);
        let mut o = Orchestrator::new(&p);
        o.declare_generator(coord("com.example:conjure-rust:0.3.0"));
        let build = o.configure().unwrap();
        let g = &build.graph;
        let gen = g.get(":foo:compileConjureRust").unwrap();
        assert_eq!(gen.outputs, vec![PathBuf::from("/ws/foo-rust/src")]);
        assert!(gen.depends_on.contains(":foo:compileIr"));
        assert!(gen.depends_on.contains(":foo:extractConjureRust"));
        assert_eq!(
            gen.description.as_deref(),
            Some("Generates rust files from your Conjure definition.")
        );
        match &g.get(":foo:extractConjureRust").unwrap().action {
            Action::Extract { into, executable, .. } => {
                assert_eq!(into, Path::new("/ws/foo-rust/build/generator"));
                assert_eq!(executable, "conjure-rust");
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(g.get(":foo:compileConjure").unwrap().depends_on.contains(":foo:compileConjureRust"));
        assert!(g.get(":foo:clean").unwrap().depends_on.contains(":foo:cleanCompileConjureRust"));
        assert!(g.get(":foo:clean").unwrap().depends_on.contains(":foo:cleanExtractConjureRust"));
        match &g.get(":foo:cleanExtractConjureRust").unwrap().action {
            Action::Delete { targets } => {
                assert_eq!(targets, &vec![PathBuf::from("/ws/foo-rust/build/generator")])
            }
            other => panic!("unexpected action: {other:?}"),
        }
        // No gitignore or library wiring for generic targets.
        assert!(!g.paths().any(|p| p.starts_with(":foo-rust:gitignore")));
        assert!(build.units["foo-rust"].dependencies.is_empty());
    }

    #[test]
    fn test_cj008_late_declaration_is_accepted() {
        let p = project("foo", &["foo-go"]);
        let mut o = Orchestrator::new(&p);
        // Discovery already knows the unit; the generator arrives afterwards.
        assert_eq!(discover(&p).unwrap().len(), 1);
        o.declare_generator(coord("x:conjure-go:1"));
        assert!(o.configure().is_ok());
    }

    #[test]
    fn test_cj008_root_ide_sync_depends_on_aggregate() {
        let m: Manifest = serde_yaml_ng::from_str(
            "root: foo\nplugins: [idea]\nunits:\n  foo-objects:\n    plugins: [idea]\n",
        )
        .unwrap();
        let p = Project::from_manifest(&m, Path::new("/ws"));
        let build = configure_manifest(&m, &p).unwrap();
        assert!(build
            .graph
            .get(":foo:ideaModule")
            .unwrap()
            .depends_on
            .contains(":foo:compileConjure"));
        assert!(build
            .graph
            .get(":foo-objects:ideaModule")
            .unwrap()
            .depends_on
            .contains(":foo:compileConjureObjects"));
        let idea = build.units["foo-objects"].idea.clone().unwrap();
        assert_eq!(idea.generated_source_dirs, vec![PathBuf::from("/ws/foo-objects/src/generated/java")]);
    }

    #[test]
    fn test_cj008_audit_warning_is_collected() {
        let m: Manifest = serde_yaml_ng::from_str(
            "root: foo\nunits:\n  foo-objects:\n    plugins: [exact-dependencies]\n",
        )
        .unwrap();
        let p = Project::from_manifest(&m, Path::new("/ws"));
        let build = configure_manifest(&m, &p).unwrap();
        assert_eq!(build.warnings.len(), 1);
        assert!(build.units["foo-objects"].ignored_unused_dependencies.is_empty());
    }

    #[test]
    fn test_cj008_product_dependencies_flow() {
        let m: Manifest = serde_yaml_ng::from_str(
            r#"
root: foo
units:
  foo-objects: {}
  foo-jersey: {}
  foo-typescript: {}
versions:
  com.palantir.conjure:conjure: 4.13.0
product_dependencies:
  - product_group: com.example
    product_name: backend
    minimum_version: 1.0.0
    maximum_version: 1.x.x
"#,
        )
        .unwrap();
        let p = Project::from_manifest(&m, Path::new("/ws"));
        let build = configure_manifest(&m, &p).unwrap();
        let g = &build.graph;
        match &g.get(":foo:extractConjure").unwrap().action {
            Action::Extract { coordinate, .. } => assert_eq!(coordinate.version.as_deref(), Some("4.13.0")),
            other => panic!("unexpected action: {other:?}"),
        }
        let ts = g.get(":foo:compileConjureTypeScript").unwrap();
        assert!(ts.depends_on.contains(":foo:generateConjureServiceDependencies"));
        match &ts.action {
            Action::Generate { options, .. } => assert_eq!(
                options.get("productDependencies"),
                Some(&OptionValue::String("/ws/build/service-dependencies.json".into()))
            ),
            other => panic!("unexpected action: {other:?}"),
        }
        let attrs = &build.units["foo-jersey"].manifest_attributes;
        assert!(attrs["Sls-Recommended-Product-Dependencies"].contains("backend"));
        assert!(build.units["foo-objects"].manifest_attributes.is_empty());
    }

    fn full_project_build() -> ConfiguredBuild {
        let p = project(
            "foo",
            &[
                "foo-objects",
                "foo-jersey",
                "foo-retrofit",
                "foo-undertow",
                "foo-dialogue",
                "foo-typescript",
                "foo-python",
                "foo-rust",
            ],
        );
        let mut o = Orchestrator::new(&p);
        o.declare_generator(coord("com.example:conjure-rust:0.3.0"));
        o.configure().unwrap()
    }

    #[test]
    fn test_cj008_deterministic() {
        let a = full_project_build();
        let b = full_project_build();
        assert_eq!(a.graph, b.graph);
        assert_eq!(a.graph.edges(), b.graph.edges());
        assert_eq!(a.graph.topological_order().unwrap(), b.graph.topological_order().unwrap());
    }

    #[test]
    fn test_cj008_ordering_properties() {
        let build = full_project_build();
        let g = &build.graph;
        let generations: Vec<&WorkItem> = g
            .items()
            .filter(|i| matches!(i.action, Action::Generate { .. }))
            .collect();
        assert_eq!(generations.len(), 8);
        for gen in &generations {
            assert!(g.depends_transitively(&gen.path, ":foo:compileIr"));
            assert!(!g.depends_transitively(":foo:compileIr", &gen.path));
            let Action::Generate { output_dir, .. } = &gen.action else {
                unreachable!()
            };
            // Every unit compile reading from the output depends on generation.
            for compile in g.items().filter(|i| i.name == "compileJava") {
                let unit_dir = PathBuf::from(format!("/ws/{}", compile.unit));
                if output_dir.starts_with(&unit_dir) {
                    assert!(g.depends_transitively(&compile.path, &gen.path));
                }
            }
        }
        assert!(g
            .get(":foo:publishTypeScript")
            .map(|i| g.depends_transitively(&i.path, ":foo:compileConjureTypeScript"))
            .unwrap_or(false));
        g.topological_order().unwrap();
    }

    proptest! {
        #[test]
        fn prop_cj008_missing_generator_names_unit(language in "[a-z]{2,8}") {
            prop_assume!(!naming::is_first_class(&language));
            let unit = format!("foo-{}", language);
            let p = project("foo", &[unit.as_str()]);
            match Orchestrator::new(&p).configure() {
                Err(Error::MissingGenerator { unit: u, expected }) => {
                    prop_assert_eq!(u, unit);
                    prop_assert_eq!(expected, format!("conjure-{}", language));
                }
                other => prop_assert!(false, "unexpected result: {:?}", other.map(|b| b.root)),
            }
        }

        #[test]
        fn prop_cj008_sibling_required(kind in prop::sample::select(vec![
            FirstClassKind::Jersey,
            FirstClassKind::Retrofit,
            FirstClassKind::Undertow,
            FirstClassKind::Dialogue,
        ])) {
            let unit = naming::sibling_name("foo", kind);
            let p = project("foo", &[unit.as_str()]);
            let is_missing_sibling = matches!(
                Orchestrator::new(&p).configure(),
                Err(Error::MissingSibling { .. })
            );
            prop_assert!(is_missing_sibling);
        }

        #[test]
        fn prop_cj008_generation_never_precedes_ir(mask in 0u8..128) {
            let children: Vec<String> = FirstClassKind::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| naming::sibling_name("foo", *k))
                .chain(std::iter::once("foo-objects".to_string()))
                .collect::<indexmap::IndexSet<_>>()
                .into_iter()
                .collect();
            let refs: Vec<&str> = children.iter().map(String::as_str).collect();
            let p = project("foo", &refs);
            let build = Orchestrator::new(&p).configure().unwrap();
            let order = build.graph.topological_order().unwrap();
            let ir = order.iter().position(|t| t == ":foo:compileIr").unwrap();
            for item in build.graph.items().filter(|i| matches!(i.action, Action::Generate { .. })) {
                let pos = order.iter().position(|t| t == &item.path).unwrap();
                prop_assert!(pos > ir);
            }
        }
    }
}
