//! CJ-004: Generator declarations and late-bound resolution.
//!
//! Declarations are collected in a `Declaring` phase. `finalize()` is the
//! one phase transition: it validates every dependency name and freezes the
//! set. Only a `Finalized` set can resolve generic units, and only a
//! `Declaring` set accepts declarations.

use super::error::{Error, Result};
use super::naming::{self, GENERATOR_PREFIX};
use super::types::Coordinate;
use indexmap::IndexMap;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Phase marker: declarations are still being collected.
#[derive(Debug)]
pub struct Declaring;

/// Phase marker: the declaration set is frozen and validated.
#[derive(Debug)]
pub struct Finalized;

/// The set of declared generator dependencies, parameterized by phase.
#[derive(Debug)]
pub struct GeneratorSet<Phase> {
    declared: Vec<Coordinate>,
    by_language: IndexMap<String, Coordinate>,
    _phase: PhantomData<Phase>,
}

impl Default for GeneratorSet<Declaring> {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorSet<Declaring> {
    pub fn new() -> Self {
        Self {
            declared: Vec::new(),
            by_language: IndexMap::new(),
            _phase: PhantomData,
        }
    }

    /// Declare a generator dependency. Validation is deferred to `finalize`.
    pub fn declare(&mut self, coordinate: Coordinate) {
        debug!(generator = %coordinate, "declared generator dependency");
        self.declared.push(coordinate);
    }

    /// Number of declarations so far.
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Freeze the declarations, checking every name carries the reserved prefix.
    pub fn finalize(self) -> Result<GeneratorSet<Finalized>> {
        let mut by_language: IndexMap<String, Coordinate> = IndexMap::new();
        for coordinate in &self.declared {
            let language = naming::generator_language(&coordinate.name).ok_or_else(|| {
                Error::MalformedGeneratorName {
                    prefix: GENERATOR_PREFIX,
                    name: coordinate.name.clone(),
                    coordinate: coordinate.to_string(),
                }
            })?;
            if let Some(existing) = by_language.get(language) {
                return Err(Error::DuplicateGenerator {
                    language: language.to_string(),
                    first: existing.to_string(),
                    second: coordinate.to_string(),
                });
            }
            by_language.insert(language.to_string(), coordinate.clone());
        }
        info!(generators = by_language.len(), "generator declarations finalized");
        Ok(GeneratorSet {
            declared: self.declared,
            by_language,
            _phase: PhantomData,
        })
    }
}

impl GeneratorSet<Finalized> {
    /// Matching generator for a language identifier.
    pub fn generator_for(&self, language: &str) -> Option<&Coordinate> {
        self.by_language.get(language)
    }

    /// Languages with a declared generator, in declaration order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.by_language.keys().map(String::as_str)
    }

    /// Resolve every generic `(unit, language)` pair to its generator.
    ///
    /// First-class languages are skipped. A generic unit with no matching
    /// declaration fails with `MissingGenerator`.
    pub fn resolve<'a, I>(&self, generic_units: I) -> Result<IndexMap<String, Coordinate>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut resolved = IndexMap::new();
        for (unit, language) in generic_units {
            if naming::is_first_class(language) {
                continue;
            }
            let coordinate = self
                .generator_for(language)
                .ok_or_else(|| Error::MissingGenerator {
                    unit: unit.to_string(),
                    expected: naming::generator_name(language),
                })?;
            resolved.insert(unit.to_string(), coordinate.clone());
        }
        Ok(resolved)
    }
}
