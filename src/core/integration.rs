//! CJ-007: Optional integrations — IDE sync and dependency auditing.
//!
//! Each integration is a capability interface with a present and an absent
//! (no-op) implementation. `IntegrationRegistry::probe` selects one per unit
//! from its declared plugins; wiring only ever talks to the trait objects.

use super::error::{Result, Warning};
use super::graph::TaskGraph;
use super::types::*;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const IDEA_PLUGIN: &str = "idea";
pub const ECLIPSE_PLUGIN: &str = "eclipse";
pub const EXACT_DEPENDENCIES_PLUGIN: &str = "exact-dependencies";

pub const IDEA_MODULE_TASK: &str = "ideaModule";
pub const ECLIPSE_CLASSPATH_TASK: &str = "eclipseClasspath";
pub const CHECK_UNUSED_DEPENDENCIES_TASK: &str = "checkUnusedDependencies";

// ============================================================================
// IDE sync
// ============================================================================

/// Hooks generation into a unit's IDE metadata sync.
pub trait IdeSync: fmt::Debug {
    /// Make `task` a prerequisite of the unit's IDE sync tasks and record
    /// `generated_dir` in the IDE model.
    fn attach(
        &self,
        graph: &mut TaskGraph,
        unit: &BuildUnit,
        task: &str,
        generated_dir: Option<&Path>,
        config: Option<&mut UnitConfiguration>,
    ) -> Result<()>;
}

/// IDE integration applied to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentIde {
    pub idea: bool,
    pub eclipse: bool,
}

impl IdeSync for PresentIde {
    fn attach(
        &self,
        graph: &mut TaskGraph,
        unit: &BuildUnit,
        task: &str,
        generated_dir: Option<&Path>,
        config: Option<&mut UnitConfiguration>,
    ) -> Result<()> {
        if self.idea {
            let module = external_task(graph, unit, IDEA_MODULE_TASK)?;
            graph.depend(&module, task)?;
            if let (Some(dir), Some(config)) = (generated_dir, config) {
                let idea = config.idea.get_or_insert_with(IdeaModule::default);
                let dir = dir.to_path_buf();
                if !idea.source_dirs.contains(&dir) {
                    idea.source_dirs.push(dir.clone());
                }
                if !idea.generated_source_dirs.contains(&dir) {
                    idea.generated_source_dirs.push(dir);
                }
            }
        }
        if self.eclipse {
            let classpath = external_task(graph, unit, ECLIPSE_CLASSPATH_TASK)?;
            graph.depend(&classpath, task)?;
        }
        Ok(())
    }
}

/// No IDE integration on the unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsentIde;

impl IdeSync for AbsentIde {
    fn attach(
        &self,
        _graph: &mut TaskGraph,
        _unit: &BuildUnit,
        _task: &str,
        _generated_dir: Option<&Path>,
        _config: Option<&mut UnitConfiguration>,
    ) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Dependency audit
// ============================================================================

/// Tells an unused-dependency checker to ignore libraries added by wiring.
pub trait DependencyAudit: fmt::Debug {
    fn ignore(
        &self,
        unit: &BuildUnit,
        modules: &[&str],
        config: &mut UnitConfiguration,
    ) -> std::result::Result<(), Warning>;
}

/// Exact-dependencies checker applied to the unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactDependencies;

impl DependencyAudit for ExactDependencies {
    fn ignore(
        &self,
        unit: &BuildUnit,
        modules: &[&str],
        config: &mut UnitConfiguration,
    ) -> std::result::Result<(), Warning> {
        if !unit.has_task(CHECK_UNUSED_DEPENDENCIES_TASK) {
            return Err(Warning::OptionalIntegrationUnavailable {
                integration: EXACT_DEPENDENCIES_PLUGIN.to_string(),
                unit: unit.name.clone(),
                reason: format!("no '{}' task to configure", CHECK_UNUSED_DEPENDENCIES_TASK),
            });
        }
        for module in modules {
            if !config.ignored_unused_dependencies.iter().any(|m| m == module) {
                config.ignored_unused_dependencies.push(module.to_string());
            }
        }
        Ok(())
    }
}

/// No dependency checker on the unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudit;

impl DependencyAudit for NoAudit {
    fn ignore(
        &self,
        _unit: &BuildUnit,
        _modules: &[&str],
        _config: &mut UnitConfiguration,
    ) -> std::result::Result<(), Warning> {
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

static ABSENT_IDE: AbsentIde = AbsentIde;
static NO_AUDIT: NoAudit = NoAudit;

/// Integrations selected once per unit.
#[derive(Debug, Default)]
pub struct IntegrationRegistry {
    ide: IndexMap<String, Box<dyn IdeSync>>,
    audit: IndexMap<String, Box<dyn DependencyAudit>>,
}

impl IntegrationRegistry {
    /// A registry where every unit gets the no-op variants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Probe the declared plugins of the root and every child.
    pub fn probe(project: &Project) -> Self {
        let mut registry = Self::empty();
        for unit in std::iter::once(&project.root).chain(project.children.values()) {
            let idea = unit.has_plugin(IDEA_PLUGIN);
            let eclipse = unit.has_plugin(ECLIPSE_PLUGIN);
            if idea || eclipse {
                debug!(unit = %unit.name, idea, eclipse, "IDE integration present");
                registry = registry.with_ide(&unit.name, Box::new(PresentIde { idea, eclipse }));
            }
            if unit.has_plugin(EXACT_DEPENDENCIES_PLUGIN) {
                debug!(unit = %unit.name, "dependency audit present");
                registry = registry.with_audit(&unit.name, Box::new(ExactDependencies));
            }
        }
        registry
    }

    pub fn with_ide(mut self, unit: &str, ide: Box<dyn IdeSync>) -> Self {
        self.ide.insert(unit.to_string(), ide);
        self
    }

    pub fn with_audit(mut self, unit: &str, audit: Box<dyn DependencyAudit>) -> Self {
        self.audit.insert(unit.to_string(), audit);
        self
    }

    pub fn ide(&self, unit: &str) -> &dyn IdeSync {
        match self.ide.get(unit) {
            Some(ide) => ide.as_ref(),
            None => &ABSENT_IDE,
        }
    }

    pub fn audit(&self, unit: &str) -> &dyn DependencyAudit {
        match self.audit.get(unit) {
            Some(audit) => audit.as_ref(),
            None => &NO_AUDIT,
        }
    }
}

/// Return (registering if needed) a task owned by the surrounding build.
pub fn external_task(graph: &mut TaskGraph, unit: &BuildUnit, name: &str) -> Result<String> {
    let path = task_path(&unit.name, name);
    graph.ensure(&path, || WorkItem::new(&unit.name, name, Action::External))
}
