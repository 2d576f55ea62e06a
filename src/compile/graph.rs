use std::{collections::HashMap, fmt};

use crate::{
    compile::labels::{Label, LabelAllocator},
    foundation::core::StreamKind,
};

/// One unit of the filter graph: consumes `inputs`, runs `filter`, produces `outputs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Consumed labels, in pad order.
    pub inputs: Vec<Label>,
    /// Filter chain text (`concat=n=2:v=1:a=1`, `trim=start=3,setpts=PTS-STARTPTS`).
    pub filter: String,
    /// Produced labels, in pad order.
    pub outputs: Vec<Label>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for l in &self.inputs {
            write!(f, "{l}")?;
        }
        f.write_str(&self.filter)?;
        for l in &self.outputs {
            write!(f, "{l}")?;
        }
        Ok(())
    }
}

/// Ordered list of segments in first-compiled order.
#[derive(Clone, Debug, Default)]
pub struct FilterGraph {
    segments: Vec<Segment>,
}

impl FilterGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Segments in emission order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `-filter_complex` expression: segments joined with `;`.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(Segment::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Feed every filter output consumed more than once through a `split` / `asplit`.
    ///
    /// A filter pad can only be linked once, while shared sub-trees hand the same labels to
    /// several consumers. Each such label gets one split segment right after its producer, and
    /// consumers (segment inputs first, then `maps`) take the split outputs in order. Raw input
    /// streams may be referenced repeatedly and are left alone.
    ///
    /// Filter outputs nothing consumes (streams dropped by a concat arity or a count override)
    /// are terminated in a `nullsink` / `anullsink`, since ffmpeg rejects unconnected pads.
    pub fn expand_fanout(self, maps: Vec<Label>, labels: &mut LabelAllocator) -> (Self, Vec<Label>) {
        let mut uses: HashMap<Label, usize> = HashMap::new();
        for l in self
            .segments
            .iter()
            .flat_map(|s| s.inputs.iter())
            .chain(maps.iter())
            .filter(|l| !l.is_input())
        {
            *uses.entry(l.clone()).or_default() += 1;
        }

        let mut branches: HashMap<Label, (Vec<Label>, usize)> = HashMap::new();
        let mut segments = Vec::with_capacity(self.segments.len());
        for mut segment in self.segments {
            for input in &mut segment.inputs {
                if let Some(next) = take_branch(&mut branches, input) {
                    *input = next;
                }
            }

            let shared: Vec<(Label, usize)> = segment
                .outputs
                .iter()
                .filter_map(|l| uses.get(l).filter(|n| **n > 1).map(|n| (l.clone(), *n)))
                .collect();
            let unused: Vec<Label> = segment
                .outputs
                .iter()
                .filter(|l| !l.is_input() && !uses.contains_key(*l))
                .cloned()
                .collect();
            segments.push(segment);

            for label in unused {
                let sink = match label.kind() {
                    StreamKind::Video => "nullsink",
                    StreamKind::Audio => "anullsink",
                };
                tracing::debug!(label = label.name(), "discarding unused output");
                segments.push(Segment {
                    inputs: vec![label],
                    filter: sink.to_string(),
                    outputs: Vec::new(),
                });
            }

            for (label, n) in shared {
                let outs = labels.allocate_many(label.kind(), n);
                let name = match label.kind() {
                    StreamKind::Video => "split",
                    StreamKind::Audio => "asplit",
                };
                tracing::debug!(label = label.name(), consumers = n, "splitting shared output");
                segments.push(Segment {
                    inputs: vec![label.clone()],
                    filter: format!("{name}={n}"),
                    outputs: outs.clone(),
                });
                branches.insert(label, (outs, 0));
            }
        }

        let maps = maps
            .into_iter()
            .map(|l| take_branch(&mut branches, &l).unwrap_or(l))
            .collect();
        (Self { segments }, maps)
    }
}

fn take_branch(branches: &mut HashMap<Label, (Vec<Label>, usize)>, label: &Label) -> Option<Label> {
    let (outs, cursor) = branches.get_mut(label)?;
    let next = outs.get(*cursor).cloned();
    *cursor += 1;
    next
}

#[cfg(test)]
#[path = "../../tests/unit/compile/graph.rs"]
mod tests;
