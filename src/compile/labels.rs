use std::fmt;

use crate::foundation::core::StreamKind;

/// Handle naming one stream flowing between filter-graph segments.
///
/// Two flavours exist: raw input streams (`0:v:1`) addressed by input index, and fresh labels
/// (`f12`) minted by a [`LabelAllocator`]. Fresh labels use a prefix no stream specifier can
/// start with, so they never collide with input streams.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    name: String,
    kind: StreamKind,
    input: bool,
}

impl Label {
    /// Raw stream `stream` of domain `kind` from pipeline input `input`.
    pub fn input(input: usize, kind: StreamKind, stream: usize) -> Self {
        Self {
            name: format!("{input}:{}:{stream}", kind.specifier()),
            kind,
            input: true,
        }
    }

    /// Bare label text.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream domain carried by the label.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Whether this addresses a raw input stream rather than a filter output.
    pub fn is_input(&self) -> bool {
        self.input
    }

    /// Argument for `-map`: input streams are mapped bare, filter outputs in brackets.
    pub fn map_arg(&self) -> String {
        if self.input {
            self.name.clone()
        } else {
            format!("[{}]", self.name)
        }
    }
}

/// Renders as a bracketed pad reference (`[f3]`, `[0:a:0]`).
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.name)
    }
}

/// The only source of fresh labels in a compilation run.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u64,
}

impl LabelAllocator {
    /// Allocator starting at `f0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused label.
    pub fn allocate(&mut self, kind: StreamKind) -> Label {
        let n = self.next;
        self.next += 1;
        Label {
            name: format!("f{n}"),
            kind,
            input: false,
        }
    }

    /// `count` fresh labels of one domain.
    pub fn allocate_many(&mut self, kind: StreamKind, count: usize) -> Vec<Label> {
        (0..count).map(|_| self.allocate(kind)).collect()
    }

    /// Number of labels handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/labels.rs"]
mod tests;
