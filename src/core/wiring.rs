//! CJ-006: First-class unit wiring.
//!
//! Every first-class kind is described by a `WiringProfile` record: sibling
//! requirement, generator tool, output root, library dependencies and the
//! post-generation step chain. `wire_first_class` is the single function
//! that turns a profile into work items.

use super::error::{Error, Result, Warning};
use super::graph::{GenerationStep, IrCompilation, TaskGraphBuilder, COMPILE_CONJURE, TASK_GROUP};
use super::integration::{external_task, IntegrationRegistry};
use super::naming::{self, FirstClassKind};
use super::types::*;
use indexmap::IndexMap;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const JAVA_GENERATED_SOURCE_DIR: &str = "src/generated/java";
pub const JAVA_LIBRARY_PLUGIN: &str = "java-library";
pub const COMPILE_JAVA_TASK: &str = "compileJava";
pub const PUBLISH_TASK: &str = "publish";
pub const SERVICE_DEPENDENCIES_ATTRIBUTE: &str = "Sls-Recommended-Product-Dependencies";

const CONJURE_JAVA_LIB: &str = "com.palantir.conjure.java:conjure-lib";
const GUAVA: &str = "com.google.guava:guava";
const ANNOTATION_API: &str = "jakarta.annotation:jakarta.annotation-api:1.3.5";

// ============================================================================
// Profiles
// ============================================================================

/// Executable distribution that generates code for a first-class kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorTool {
    Java,
    TypeScript,
    Python,
}

impl GeneratorTool {
    pub fn coordinate(self) -> &'static str {
        match self {
            Self::Java => "com.palantir.conjure.java:conjure-java",
            Self::TypeScript => "com.palantir.conjure.typescript:conjure-typescript@tgz",
            Self::Python => "com.palantir.conjure.python:conjure-python",
        }
    }

    pub fn extract_task(self) -> &'static str {
        match self {
            Self::Java => "extractConjureJava",
            Self::TypeScript => "extractConjureTypeScript",
            Self::Python => "extractConjurePython",
        }
    }

    pub fn executable(self) -> &'static str {
        match self {
            Self::Java => "conjure-java",
            Self::TypeScript => "conjure-typescript",
            Self::Python => "conjure-python",
        }
    }

    /// Directory under the root build dir holding the extracted tool.
    pub fn install_dir(self) -> &'static str {
        match self {
            Self::Java => "conjureJava",
            Self::TypeScript => "conjureTypeScript",
            Self::Python => "conjurePython",
        }
    }

    fn options(self, options: &OptionsDecl) -> GeneratorOptions {
        match self {
            Self::Java => options.java.clone(),
            Self::TypeScript => options.typescript.clone(),
            Self::Python => options.python.clone(),
        }
    }
}

/// External program run by a post-generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Npm,
    Python,
}

impl Program {
    pub fn command(self) -> &'static str {
        match self {
            Self::Npm if cfg!(windows) => "npm.cmd",
            Self::Npm => "npm",
            Self::Python => "python",
        }
    }
}

/// One step after generation. Runs in the generated output root.
///
/// Arguments may contain `{build}` and `{dist}`, expanded to the kind's
/// packaging directories under the root build dir.
#[derive(Debug, Clone, Copy)]
pub struct PostStep {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub program: Program,
    pub args: &'static [&'static str],
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
    /// Attach under this unit task when the unit declares it
    pub attach_to: Option<&'static str>,
}

/// Per-kind wiring data.
#[derive(Debug, Clone, Copy)]
pub struct WiringProfile {
    pub kind: FirstClassKind,
    pub tool: GeneratorTool,
    pub requires_objects: bool,
    pub flag: Option<&'static str>,
    pub output_dir: &'static str,
    pub gitignore: &'static str,
    pub description: &'static str,
    pub libraries: &'static [(DependencyScope, &'static str)],
    pub links_objects: bool,
    pub java_library: bool,
    pub service_dependencies: bool,
    pub audit_ignores: &'static [&'static str],
    pub post_steps: &'static [PostStep],
}

const JAVA_GITIGNORE: &str = "/src/generated/java/\n";
const JAVA_AUDIT_IGNORES: &[&str] = &[CONJURE_JAVA_LIB, GUAVA];

const TYPESCRIPT_STEPS: &[PostStep] = &[
    PostStep {
        name: "installTypeScriptDependencies",
        description: None,
        program: Program::Npm,
        args: &["install", "--no-package-lock", "--no-production"],
        inputs: &["package.json"],
        outputs: &["node_modules"],
        attach_to: None,
    },
    PostStep {
        name: "compileTypeScript",
        description: Some("Runs `npm tsc` to compile generated TypeScript files into JavaScript files."),
        program: Program::Npm,
        args: &["run-script", "build"],
        inputs: &[],
        outputs: &[],
        attach_to: None,
    },
    PostStep {
        name: "publishTypeScript",
        description: Some(
            "Runs `npm publish` to publish a TypeScript package generated from your Conjure definitions.",
        ),
        program: Program::Npm,
        args: &["publish"],
        inputs: &[],
        outputs: &[],
        attach_to: Some(PUBLISH_TASK),
    },
];

const PYTHON_STEPS: &[PostStep] = &[PostStep {
    name: "buildWheel",
    description: Some(
        "Runs `python setup.py sdist bdist_wheel --universal` to build a python wheel generated from your Conjure definitions.",
    ),
    program: Program::Python,
    args: &[
        "setup.py",
        "build",
        "--build-base",
        "{build}",
        "egg_info",
        "--egg-base",
        "{build}",
        "sdist",
        "--dist-dir",
        "{dist}",
        "bdist_wheel",
        "--universal",
        "--dist-dir",
        "{dist}",
    ],
    inputs: &[],
    outputs: &["{dist}"],
    attach_to: None,
}];

static PROFILES: [WiringProfile; 7] = [
    WiringProfile {
        kind: FirstClassKind::Objects,
        tool: GeneratorTool::Java,
        requires_objects: false,
        flag: Some("objects"),
        output_dir: JAVA_GENERATED_SOURCE_DIR,
        gitignore: JAVA_GITIGNORE,
        description: "Generates Java POJOs from your Conjure definitions.",
        libraries: &[(DependencyScope::Api, CONJURE_JAVA_LIB)],
        links_objects: false,
        java_library: true,
        service_dependencies: false,
        audit_ignores: JAVA_AUDIT_IGNORES,
        post_steps: &[],
    },
    WiringProfile {
        kind: FirstClassKind::Retrofit,
        tool: GeneratorTool::Java,
        requires_objects: true,
        flag: Some("retrofit"),
        output_dir: JAVA_GENERATED_SOURCE_DIR,
        gitignore: JAVA_GITIGNORE,
        description: "Generates Retrofit interfaces for use on the client-side from your Conjure definitions.",
        libraries: &[
            (DependencyScope::Api, GUAVA),
            (DependencyScope::Api, "com.squareup.retrofit2:retrofit"),
            (DependencyScope::CompileOnly, ANNOTATION_API),
        ],
        links_objects: true,
        java_library: true,
        service_dependencies: true,
        audit_ignores: JAVA_AUDIT_IGNORES,
        post_steps: &[],
    },
    WiringProfile {
        kind: FirstClassKind::Jersey,
        tool: GeneratorTool::Java,
        requires_objects: true,
        flag: Some("jersey"),
        output_dir: JAVA_GENERATED_SOURCE_DIR,
        gitignore: JAVA_GITIGNORE,
        description: "Generates Jersey interfaces from your Conjure definitions (for use on both the client-side and server-side).",
        libraries: &[
            (DependencyScope::Api, "jakarta.ws.rs:jakarta.ws.rs-api"),
            (DependencyScope::CompileOnly, ANNOTATION_API),
        ],
        links_objects: false,
        java_library: true,
        service_dependencies: true,
        audit_ignores: JAVA_AUDIT_IGNORES,
        post_steps: &[],
    },
    WiringProfile {
        kind: FirstClassKind::Undertow,
        tool: GeneratorTool::Java,
        requires_objects: true,
        flag: Some("undertow"),
        output_dir: JAVA_GENERATED_SOURCE_DIR,
        gitignore: JAVA_GITIGNORE,
        description: "Generates Undertow server interfaces and handlers from your Conjure definitions.",
        libraries: &[(DependencyScope::Api, "com.palantir.conjure.java:conjure-undertow-lib")],
        links_objects: false,
        java_library: true,
        service_dependencies: true,
        audit_ignores: JAVA_AUDIT_IGNORES,
        post_steps: &[],
    },
    WiringProfile {
        kind: FirstClassKind::Dialogue,
        tool: GeneratorTool::Java,
        requires_objects: true,
        flag: Some("dialogue"),
        output_dir: JAVA_GENERATED_SOURCE_DIR,
        gitignore: JAVA_GITIGNORE,
        description: "Generates Dialogue client interfaces from your Conjure definitions.",
        libraries: &[(DependencyScope::Api, "com.palantir.dialogue:dialogue-target")],
        links_objects: true,
        java_library: true,
        service_dependencies: true,
        audit_ignores: JAVA_AUDIT_IGNORES,
        post_steps: &[],
    },
    WiringProfile {
        kind: FirstClassKind::Typescript,
        tool: GeneratorTool::TypeScript,
        requires_objects: false,
        flag: None,
        output_dir: "src",
        gitignore: "/src/\n",
        description: "Generates TypeScript files and a package.json from your Conjure definitions.",
        libraries: &[],
        links_objects: false,
        java_library: false,
        service_dependencies: false,
        audit_ignores: &[],
        post_steps: TYPESCRIPT_STEPS,
    },
    WiringProfile {
        kind: FirstClassKind::Python,
        tool: GeneratorTool::Python,
        requires_objects: false,
        flag: None,
        output_dir: "python",
        gitignore: "/python/\n",
        description: "Generates Python files from your Conjure definitions.",
        libraries: &[],
        links_objects: false,
        java_library: false,
        service_dependencies: false,
        audit_ignores: &[],
        post_steps: PYTHON_STEPS,
    },
];

/// The wiring profile for a kind.
pub fn profile(kind: FirstClassKind) -> &'static WiringProfile {
    let index = match kind {
        FirstClassKind::Objects => 0,
        FirstClassKind::Retrofit => 1,
        FirstClassKind::Jersey => 2,
        FirstClassKind::Undertow => 3,
        FirstClassKind::Dialogue => 4,
        FirstClassKind::Typescript => 5,
        FirstClassKind::Python => 6,
    };
    &PROFILES[index]
}

// ============================================================================
// Wiring
// ============================================================================

/// Shared inputs for wiring every unit of one project.
pub struct WiringContext<'p> {
    pub project: &'p Project,
    pub ir: &'p IrCompilation,
    pub options: &'p OptionsDecl,
    pub versions: &'p IndexMap<String, String>,
    pub integrations: &'p IntegrationRegistry,
    pub product_dependencies: &'p [ProductDependency],
    /// Task writing the service-dependencies file consumed by TypeScript
    pub service_dependencies: Option<(&'p str, PathBuf)>,
}

impl WiringContext<'_> {
    /// Tool coordinate pinned to its configured version.
    pub fn pinned(&self, coordinate: &str) -> Result<Coordinate> {
        let c = Coordinate::parse(coordinate)?;
        let version = self.versions.get(&c.module());
        Ok(c.with_default_version(version))
    }
}

/// Result of wiring one unit.
#[derive(Debug)]
pub struct WiringOutcome {
    pub config: UnitConfiguration,
    pub generation_task: String,
    pub post_tasks: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Check the sibling requirement for a kind.
pub fn check_sibling(project: &Project, unit: &BuildUnit, kind: FirstClassKind) -> Result<()> {
    if !profile(kind).requires_objects {
        return Ok(());
    }
    let sibling = naming::sibling_name(&project.root.name, FirstClassKind::Objects);
    if project.find(&sibling).is_none() {
        return Err(Error::MissingSibling {
            unit: unit.name.clone(),
            sibling,
        });
    }
    Ok(())
}

/// Wire a first-class unit according to its profile.
pub fn wire_first_class(
    builder: &mut TaskGraphBuilder<'_>,
    ctx: &WiringContext<'_>,
    unit: &BuildUnit,
    kind: FirstClassKind,
) -> Result<WiringOutcome> {
    let profile = profile(kind);
    check_sibling(ctx.project, unit, kind)?;

    let root = &ctx.project.root;
    let mut config = UnitConfiguration::new(&unit.name, LanguageMapping::FirstClass(kind));
    let mut warnings = Vec::new();

    // Generator executable, shared across kinds using the same tool
    let tool = ctx.pinned(profile.tool.coordinate())?;
    let extract = builder.extract(
        &root.name,
        profile.tool.extract_task(),
        &tool,
        root.build_dir().join(profile.tool.install_dir()),
        profile.tool.executable(),
    )?;

    let mut options = profile.tool.options(ctx.options);
    if let Some(flag) = profile.flag {
        options = options.with_flag(flag);
    }
    if kind == FirstClassKind::Typescript {
        if let Some((_, file)) = &ctx.service_dependencies {
            options = options.with(
                "productDependencies",
                OptionValue::String(file.display().to_string()),
            );
        }
    }

    let gitignore = builder.graph_mut().register(
        WorkItem::new(
            &unit.name,
            &format!("gitignoreConjure{}", kind.task_suffix()),
            Action::WriteFile {
                path: unit.file(".gitignore"),
                contents: profile.gitignore.to_string(),
            },
        )
        .output(unit.file(".gitignore")),
    )?;

    let output_dir = unit.file(profile.output_dir);
    let generate = builder.build_generation_step(
        ctx.ir,
        GenerationStep {
            unit: &root.name,
            name: format!("compileConjure{}", kind.task_suffix()),
            description: profile.description.to_string(),
            extract_task: extract,
            output_dir: output_dir.clone(),
            options,
        },
    )?;
    builder.graph_mut().depend(&generate, &gitignore)?;
    if kind == FirstClassKind::Typescript {
        if let Some((task, _)) = &ctx.service_dependencies {
            builder.graph_mut().depend(&generate, task)?;
        }
    }
    builder.wire_cleanup(&generate, output_dir.clone())?;
    let aggregate = builder.root_task(COMPILE_CONJURE);
    builder.wire_generic_owner(&aggregate, &generate)?;

    if profile.java_library {
        config.applied_plugins.push(JAVA_LIBRARY_PLUGIN.to_string());
        config.source_dirs.push(output_dir.clone());
        let compile = external_task(builder.graph_mut(), unit, COMPILE_JAVA_TASK)?;
        builder.graph_mut().depend(&compile, &generate)?;
    }

    if profile.links_objects {
        let objects_name = naming::sibling_name(&root.name, FirstClassKind::Objects);
        let objects = ctx
            .project
            .find(&objects_name)
            .ok_or_else(|| Error::MissingSibling {
                unit: unit.name.clone(),
                sibling: objects_name.clone(),
            })?;
        config.dependencies.push(LibraryDependency {
            scope: DependencyScope::Api,
            target: DependencyTarget::Unit(objects_name),
        });
        let own = external_task(builder.graph_mut(), unit, COMPILE_JAVA_TASK)?;
        let upstream = external_task(builder.graph_mut(), objects, COMPILE_JAVA_TASK)?;
        builder.graph_mut().depend(&own, &upstream)?;
    }

    for (scope, library) in profile.libraries {
        config.dependencies.push(LibraryDependency {
            scope: *scope,
            target: DependencyTarget::Library(Coordinate::parse(library)?),
        });
    }

    if !profile.audit_ignores.is_empty() {
        if let Err(warning) = ctx
            .integrations
            .audit(&unit.name)
            .ignore(unit, profile.audit_ignores, &mut config)
        {
            warn!(unit = %unit.name, "{}", warning);
            warnings.push(warning);
        }
    }

    if profile.service_dependencies && !ctx.product_dependencies.is_empty() {
        let payload = serde_json::json!({
            "recommended-product-dependencies": ctx.product_dependencies,
        });
        config
            .manifest_attributes
            .insert(SERVICE_DEPENDENCIES_ATTRIBUTE.to_string(), payload.to_string());
    }

    ctx.integrations.ide(&unit.name).attach(
        builder.graph_mut(),
        unit,
        &generate,
        Some(output_dir.as_path()),
        Some(&mut config),
    )?;

    let post_tasks = wire_post_steps(builder, ctx, unit, profile, &generate, &output_dir)?;

    debug!(unit = %unit.name, kind = %kind, task = %generate, "wired first-class unit");
    Ok(WiringOutcome {
        config,
        generation_task: generate,
        post_tasks,
        warnings,
    })
}

/// Chain the profile's post-generation steps, each a strict successor of the last.
fn wire_post_steps(
    builder: &mut TaskGraphBuilder<'_>,
    ctx: &WiringContext<'_>,
    unit: &BuildUnit,
    profile: &WiringProfile,
    generate: &str,
    output_dir: &std::path::Path,
) -> Result<Vec<String>> {
    let root = &ctx.project.root;
    let packaging = root.build_dir().join(profile.kind.suffix());
    let dist = packaging.join("dist");
    let expand = |arg: &str| -> String {
        arg.replace("{build}", &packaging.display().to_string())
            .replace("{dist}", &dist.display().to_string())
    };
    let resolve = |rel: &str| -> PathBuf {
        if rel.contains('{') {
            PathBuf::from(expand(rel))
        } else {
            output_dir.join(rel)
        }
    };

    let mut previous = generate.to_string();
    let mut paths = Vec::with_capacity(profile.post_steps.len());
    for step in profile.post_steps {
        let mut item = WorkItem::new(
            &root.name,
            step.name,
            Action::Exec {
                program: step.program.command().to_string(),
                args: step.args.iter().map(|a| expand(a)).collect(),
                working_dir: output_dir.to_path_buf(),
            },
        )
        .after(&previous);
        if let Some(description) = step.description {
            item = item.grouped(TASK_GROUP, description);
        }
        for input in step.inputs {
            item = item.input(TaskInput::File(resolve(input)));
        }
        for output in step.outputs {
            item = item.output(resolve(output));
        }
        let path = builder.graph_mut().register(item)?;
        if let Some(owner) = step.attach_to {
            if unit.has_task(owner) {
                let owner = external_task(builder.graph_mut(), unit, owner)?;
                builder.graph_mut().depend(&owner, &path)?;
            }
        }
        previous = path.clone();
        paths.push(path);
    }
    Ok(paths)
}
