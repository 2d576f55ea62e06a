//! YAML anchor identity for recipe values.
//!
//! `serde_yaml` expands every `*alias` into an independent copy of the anchored value, which
//! loses the fact that both places name the same sub-tree. The document is therefore scanned a
//! second time at the event level; the resulting [`Shape`] mirrors the value tree and carries the
//! anchor id of every anchored node, including each place an alias expanded to. [`table`] then
//! maps the addresses of those values inside the parsed tree to their anchor id.

use std::collections::HashMap;

use anyhow::Context as _;
use serde_yaml::{Mapping, Value};
use yaml_rust2::parser::{Event, EventReceiver, Parser};

use crate::foundation::error::RecipeResult;

/// Anchor ids keyed by the address of the value they label in one parsed tree.
pub(crate) type AnchorTable = HashMap<*const Value, usize>;

/// Structure of a YAML node with its anchor id (0 when unanchored).
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Shape {
    /// Scalar.
    Leaf(usize),
    /// Sequence and its items.
    Seq(usize, Vec<Shape>),
    /// Mapping entries flattened as key, value, key, value.
    Map(usize, Vec<Shape>),
}

impl Shape {
    fn anchor(&self) -> usize {
        match self {
            Self::Leaf(a) | Self::Seq(a, _) | Self::Map(a, _) => *a,
        }
    }
}

enum Frame {
    Seq(usize, Vec<Shape>),
    Map(usize, Vec<Shape>),
}

#[derive(Default)]
struct ShapeBuilder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Shape>,
    root: Option<Shape>,
}

impl ShapeBuilder {
    fn complete(&mut self, shape: Shape) {
        if shape.anchor() != 0 {
            self.anchors.insert(shape.anchor(), shape.clone());
        }
        match self.stack.last_mut() {
            Some(Frame::Seq(_, items)) | Some(Frame::Map(_, items)) => items.push(shape),
            None => {
                if self.root.is_none() {
                    self.root = Some(shape);
                }
            }
        }
    }
}

impl EventReceiver for ShapeBuilder {
    fn on_event(&mut self, ev: Event) {
        match ev {
            Event::Scalar(_, _, anchor, ..) => self.complete(Shape::Leaf(anchor)),
            Event::Alias(id) => {
                let shape = self.anchors.get(&id).cloned().unwrap_or(Shape::Leaf(0));
                self.complete(shape);
            }
            Event::SequenceStart(anchor, ..) => self.stack.push(Frame::Seq(anchor, Vec::new())),
            Event::MappingStart(anchor, ..) => self.stack.push(Frame::Map(anchor, Vec::new())),
            Event::SequenceEnd | Event::MappingEnd => {
                let shape = match self.stack.pop() {
                    Some(Frame::Seq(anchor, items)) => Shape::Seq(anchor, items),
                    Some(Frame::Map(anchor, items)) => Shape::Map(anchor, items),
                    None => return,
                };
                self.complete(shape);
            }
            _ => {}
        }
    }
}

/// Scan `src` for anchors; `None` for an empty document.
pub(crate) fn scan(src: &str) -> RecipeResult<Option<Shape>> {
    let mut builder = ShapeBuilder::default();
    Parser::new_from_str(src)
        .load(&mut builder, false)
        .context("scan recipe YAML anchors")?;
    Ok(builder.root)
}

/// Anchor ids of the values under `root`, which must be the tree `shape` was scanned from.
pub(crate) fn table(root: &Mapping, shape: Option<&Shape>) -> AnchorTable {
    let mut out = AnchorTable::new();
    if let Some(Shape::Map(_, entries)) = shape {
        index_entries(root, entries, &mut out);
    }
    out
}

fn index_entries(map: &Mapping, entries: &[Shape], out: &mut AnchorTable) {
    for ((_, value), shape) in map.iter().zip(entries.iter().skip(1).step_by(2)) {
        index(value, shape, out);
    }
}

fn index(value: &Value, shape: &Shape, out: &mut AnchorTable) {
    if shape.anchor() != 0 {
        out.insert(std::ptr::from_ref(value), shape.anchor());
    }
    let inner = match value {
        Value::Tagged(tagged) => &tagged.value,
        other => other,
    };
    match (inner, shape) {
        (Value::Sequence(items), Shape::Seq(_, shapes)) => {
            for (v, s) in items.iter().zip(shapes) {
                index(v, s, out);
            }
        }
        (Value::Mapping(map), Shape::Map(_, entries)) => index_entries(map, entries, out),
        _ => {}
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/anchors.rs"]
mod tests;
