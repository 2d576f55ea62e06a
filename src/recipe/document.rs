use std::path::Path;

use anyhow::Context as _;
use serde_yaml::{Mapping, Value};

use crate::{
    foundation::core::NodeId,
    foundation::error::{RecipeError, RecipeResult},
    recipe::anchors::{self, Shape},
    recipe::model::EditGraph,
    recipe::normalize::{Normalizer, scalar_string},
};

/// Flags used when a recipe has no flags section.
pub const DEFAULT_FLAGS: [&str; 4] = ["-y", "-loglevel", "warning", "-stats"];
/// Output arguments used when a recipe has no output section.
pub const DEFAULT_OUTPUT: &str = "out.mkv";
/// Target built when none is named.
pub const DEFAULT_TARGET: &str = "all";
/// Default key of the flags section.
pub const DEFAULT_FLAGS_KEY: &str = "flags";
/// Default key of the output section.
pub const DEFAULT_OUTPUT_KEY: &str = "output";

/// A parsed recipe document: a mapping of named nodes plus configuration sections.
#[derive(Clone, Debug)]
pub struct Recipe {
    root: Mapping,
    shape: Option<Shape>,
}

/// Edit graph normalized from one recipe target.
#[derive(Clone, Debug)]
pub struct EditTree {
    /// Node arena.
    pub graph: EditGraph,
    /// Node selected by the target key.
    pub root: NodeId,
}

/// Keys of a recipe document that configure the build rather than define nodes.
#[derive(Clone, Copy, Debug)]
pub struct SectionKeys<'a> {
    /// Key of the flags section.
    pub flags: &'a str,
    /// Key of the output section.
    pub output: &'a str,
}

impl Default for SectionKeys<'_> {
    fn default() -> Self {
        Self {
            flags: DEFAULT_FLAGS_KEY,
            output: DEFAULT_OUTPUT_KEY,
        }
    }
}

impl Recipe {
    /// Parse a recipe from YAML text.
    pub fn from_yaml_str(src: &str) -> RecipeResult<Self> {
        let value: Value = serde_yaml::from_str(src).context("parse recipe YAML")?;
        let mut recipe = Self::from_value(value)?;
        recipe.shape = anchors::scan(src)?;
        Ok(recipe)
    }

    /// Read and parse a recipe file.
    pub fn from_path(path: &Path) -> RecipeResult<Self> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("read recipe '{}'", path.display()))?;
        Self::from_yaml_str(&src)
    }

    /// Wrap an already parsed YAML tree; the top level must be a mapping.
    ///
    /// Anchor identity is only known when parsing text, so aliases in `value` stay independent.
    pub fn from_value(value: Value) -> RecipeResult<Self> {
        match value {
            Value::Mapping(root) => Ok(Self { root, shape: None }),
            _ => Err(RecipeError::malformed(
                "<root>",
                "a recipe must be a mapping of named nodes",
            )),
        }
    }

    /// Names of all top-level node definitions (configuration sections excluded).
    pub fn targets(&self, keys: SectionKeys<'_>) -> Vec<String> {
        self.root
            .iter()
            .filter_map(|(k, _)| k.as_str())
            .filter(|k| *k != keys.flags && *k != keys.output)
            .map(str::to_string)
            .collect()
    }

    /// Global flags placed before the inputs.
    pub fn flags(&self, keys: SectionKeys<'_>) -> RecipeResult<Vec<String>> {
        match self.root.get(keys.flags) {
            Some(v) => string_list(v, keys.flags),
            None => Ok(DEFAULT_FLAGS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Output arguments placed after the stream maps.
    pub fn output(&self, keys: SectionKeys<'_>) -> RecipeResult<Vec<String>> {
        match self.root.get(keys.output) {
            Some(v) => string_list(v, keys.output),
            None => Ok(vec![DEFAULT_OUTPUT.to_string()]),
        }
    }

    /// Normalize the node tree rooted at `target` into an identity-preserving arena.
    #[tracing::instrument(skip(self, keys))]
    pub fn normalize(&self, target: &str, keys: SectionKeys<'_>) -> RecipeResult<EditTree> {
        let reserved = [keys.flags, keys.output];
        let anchor_ids = anchors::table(&self.root, self.shape.as_ref());
        let mut normalizer = Normalizer::new(&self.root, &reserved, &anchor_ids);
        let root = normalizer.reference(target)?;
        let graph = normalizer.finish();
        tracing::debug!(nodes = graph.len(), "normalized recipe target");
        Ok(EditTree { graph, root })
    }
}

fn string_list(value: &Value, at: &str) -> RecipeResult<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| scalar_string(v, &format!("{at}[{i}]")))
            .collect(),
        Value::Null => Ok(vec![]),
        other => Ok(vec![scalar_string(other, at)?]),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/document.rs"]
mod tests;
