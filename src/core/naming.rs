//! CJ-003: Naming conventions — unit suffixes, first-class kinds, task names.
//!
//! All string manipulation over unit and dependency names lives here.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved prefix every generator dependency name must carry.
pub const GENERATOR_PREFIX: &str = "conjure-";

/// The seven built-in generation kinds with bespoke wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstClassKind {
    Objects,
    Jersey,
    Retrofit,
    Undertow,
    Dialogue,
    Typescript,
    Python,
}

impl FirstClassKind {
    /// All kinds, in wiring order.
    pub const ALL: [FirstClassKind; 7] = [
        Self::Objects,
        Self::Retrofit,
        Self::Jersey,
        Self::Undertow,
        Self::Dialogue,
        Self::Typescript,
        Self::Python,
    ];

    /// The unit-name suffix (without the leading `-`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Jersey => "jersey",
            Self::Retrofit => "retrofit",
            Self::Undertow => "undertow",
            Self::Dialogue => "dialogue",
            Self::Typescript => "typescript",
            Self::Python => "python",
        }
    }

    /// Parse a language identifier into a first-class kind.
    pub fn from_language(language: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == language)
    }

    /// Display name used in task names (`compileConjure{TaskSuffix}`).
    pub fn task_suffix(self) -> &'static str {
        match self {
            Self::Objects => "Objects",
            Self::Jersey => "Jersey",
            Self::Retrofit => "Retrofit",
            Self::Undertow => "Undertow",
            Self::Dialogue => "Dialogue",
            Self::Typescript => "TypeScript",
            Self::Python => "Python",
        }
    }
}

impl fmt::Display for FirstClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Strip `root + "-"` from a unit name, yielding its language identifier.
pub fn derive_language(root: &str, unit: &str) -> Result<String> {
    unit.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|language| !language.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidTopology(format!(
                "unit '{}' is not named '{}-<language>'",
                unit, root
            ))
        })
}

/// Whether a language identifier has bespoke first-class wiring.
pub fn is_first_class(language: &str) -> bool {
    FirstClassKind::from_language(language).is_some()
}

/// Name of the sibling unit for a given kind (`{root}-{suffix}`).
pub fn sibling_name(root: &str, kind: FirstClassKind) -> String {
    format!("{}-{}", root, kind.suffix())
}

/// Expected generator dependency name for a language.
pub fn generator_name(language: &str) -> String {
    format!("{}{}", GENERATOR_PREFIX, language)
}

/// Strip the reserved prefix from a generator dependency name.
pub fn generator_language(name: &str) -> Option<&str> {
    name.strip_prefix(GENERATOR_PREFIX)
        .filter(|language| !language.is_empty())
}

/// Convert space/dash/underscore separated words into lowerCamelCase.
///
/// `"compile conjure rust"` becomes `compileConjureRust`,
/// `"extractConjure go-lang"` becomes `extractConjureGoLang`.
pub fn lower_camel_case(words: &str) -> String {
    let mut out = String::with_capacity(words.len());
    for (i, word) in words
        .split(|c: char| c == ' ' || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}
