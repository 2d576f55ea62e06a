use crate::foundation::core::{NodeId, StreamKind, StreamOverrides, fmt_num};

/// Arena of edit nodes produced by recipe normalization.
///
/// Children are always allocated before their parents, so every edge points at a smaller
/// [`NodeId`] and the graph is acyclic by construction. Shared sub-trees appear once in the arena
/// and are referenced by id from every consumer.
#[derive(Clone, Debug, Default)]
pub struct EditGraph {
    nodes: Vec<EditNode>,
}

impl EditGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its identity.
    pub fn add(&mut self, node: EditNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Access a node by identity.
    ///
    /// Ids are only minted by [`EditGraph::add`], so lookups on ids from this graph never miss.
    pub fn node(&self, id: NodeId) -> &EditNode {
        &self.nodes[id.0]
    }

    /// Mutable access to a node, used while normalization is still attaching parameters.
    pub fn node_mut(&mut self, id: NodeId) -> &mut EditNode {
        &mut self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate `(id, node)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &EditNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}

/// One node of the edit graph.
#[derive(Clone, Debug)]
pub struct EditNode {
    /// Variant and its parameters.
    pub kind: NodeKind,
    /// Explicit `v` / `a` / `t` overrides declared on this node.
    pub streams: StreamOverrides,
    /// Recipe key path the node was built from, used in error messages.
    pub origin: String,
}

impl EditNode {
    /// Node without overrides.
    pub fn new(kind: NodeKind, origin: impl Into<String>) -> Self {
        Self {
            kind,
            streams: StreamOverrides::default(),
            origin: origin.into(),
        }
    }

    /// Attach explicit overrides.
    pub fn with_overrides(mut self, streams: StreamOverrides) -> Self {
        self.streams = streams;
        self
    }

    /// Direct inputs in declaration order (the auxiliary audio node comes last).
    pub fn inputs(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Source(_) => vec![],
            NodeKind::Filter(f) => vec![f.input],
            NodeKind::Concat(c) => {
                let mut out = c.inputs.clone();
                out.extend(c.addaudio.as_ref().map(|m| m.audio));
                out
            }
            NodeKind::AddAudio(a) => vec![a.input, a.mix.audio],
        }
    }
}

/// Closed set of node variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Media file leaf, optionally trimmed.
    Source(Source),
    /// Chain of sub-filters over one input.
    Filter(FilterNode),
    /// Sequential join of inputs.
    Concat(ConcatNode),
    /// Mix an auxiliary node's audio onto a primary node.
    AddAudio(AddAudioNode),
}

/// Media file reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    /// File path as written in the recipe (relative to the working directory).
    pub file: String,
    /// Optional trim window.
    pub trim: Trim,
}

/// Trim window in source seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trim {
    /// Start offset into the file.
    pub start: Option<f64>,
    /// Maximum kept length.
    pub duration: Option<f64>,
}

impl Trim {
    /// Whether the window actually cuts anything.
    pub fn is_set(&self) -> bool {
        self.start.is_some() || self.duration.is_some()
    }

    /// Option list for `trim` / `atrim`.
    pub(crate) fn options(&self) -> String {
        let mut opts = Vec::new();
        if let Some(s) = self.start {
            opts.push(format!("start={}", fmt_num(s)));
        }
        if let Some(d) = self.duration {
            opts.push(format!("duration={}", fmt_num(d)));
        }
        opts.join(":")
    }
}

/// Filter node: one input plus an ordered chain of sub-filters.
#[derive(Clone, Debug)]
pub struct FilterNode {
    /// Filtered node.
    pub input: NodeId,
    /// Sub-filters applied in order.
    pub filters: Vec<SubFilter>,
}

/// Concat node: inputs joined in sequence with optional fades and a side-channel audio mix.
#[derive(Clone, Debug)]
pub struct ConcatNode {
    /// Joined nodes, in order.
    pub inputs: Vec<NodeId>,
    /// Fade-in length applied to the joined output.
    pub fadein: Option<f64>,
    /// Fade-out length applied to the joined output.
    pub fadeout: Option<f64>,
    /// Auxiliary audio mixed onto the joined audio.
    pub addaudio: Option<AudioMix>,
}

/// Standalone audio mix node.
#[derive(Clone, Debug)]
pub struct AddAudioNode {
    /// Primary node whose video and duration are kept.
    pub input: NodeId,
    /// Auxiliary audio and mix parameters.
    pub mix: AudioMix,
}

/// Auxiliary audio source plus extra mix filter options.
#[derive(Clone, Debug)]
pub struct AudioMix {
    /// Node providing the auxiliary audio.
    pub audio: NodeId,
    /// Options appended to (or replacing defaults of) the mix filter.
    pub params: FilterParams,
}

/// Positional and named filter options, rendered as `a:b:k=v`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterParams {
    /// Positional options.
    pub args: Vec<String>,
    /// Named options in declaration order.
    pub kwargs: Vec<(String, String)>,
}

impl FilterParams {
    /// Whether there is nothing to render.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Set a named option, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.kwargs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.kwargs.push((key, value)),
        }
    }

    /// Render `name[=opts]`.
    pub fn render(&self, name: &str) -> String {
        if self.is_empty() {
            return name.to_string();
        }
        let opts: Vec<String> = self
            .args
            .iter()
            .cloned()
            .chain(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")))
            .collect();
        format!("{name}={}", opts.join(":"))
    }
}

/// Which stream domains a sub-filter applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamSelector {
    /// Video streams only.
    #[default]
    Video,
    /// Audio streams only.
    Audio,
    /// Both domains.
    Both,
}

impl StreamSelector {
    /// Whether streams of `kind` are filtered.
    pub fn includes(self, kind: StreamKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Video, StreamKind::Video) | (Self::Audio, StreamKind::Audio)
        )
    }
}

/// Playback rate for `speed` / `tempo`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rate {
    /// Explicit factor (`"2x"`).
    Factor(f64),
    /// Target output duration in seconds; factor = input duration / target.
    TargetDuration(f64),
}

impl Rate {
    /// Effective factor given the input duration.
    pub fn factor(self, input_duration: f64) -> f64 {
        match self {
            Self::Factor(f) => f,
            Self::TargetDuration(t) => input_duration / t,
        }
    }
}

/// One link of a [`FilterNode`] chain.
#[derive(Clone, Debug, PartialEq)]
pub enum SubFilter {
    /// Retime video (`setpts`); divides duration by the factor.
    Speed(Rate),
    /// Retime audio (`atempo`).
    Tempo(Rate),
    /// Fade in over the given seconds (video `fade`, audio `afade`).
    FadeIn(f64),
    /// Fade out over the given trailing seconds.
    FadeOut(f64),
    /// Resize video.
    Scale {
        /// Target width.
        width: i64,
        /// Target height.
        height: i64,
    },
    /// Any named filter with raw options.
    Generic(GenericFilter),
}

impl SubFilter {
    /// Domains the sub-filter acts on; the other domain passes through.
    pub fn selector(&self) -> StreamSelector {
        match self {
            Self::Speed(_) | Self::Scale { .. } => StreamSelector::Video,
            Self::Tempo(_) => StreamSelector::Audio,
            Self::FadeIn(_) | Self::FadeOut(_) => StreamSelector::Both,
            Self::Generic(g) => g.selector,
        }
    }
}

/// User-named filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenericFilter {
    /// Filter name for video streams (and audio unless `audio_name` is set).
    pub name: String,
    /// Options for the video side.
    pub params: FilterParams,
    /// Domains the filter applies to.
    pub selector: StreamSelector,
    /// Alternate filter name for audio streams.
    pub audio_name: Option<String>,
    /// Alternate options for audio streams.
    pub audio_params: Option<FilterParams>,
    /// Explicit metadata the filter declares; otherwise metadata-neutral.
    pub overrides: StreamOverrides,
}

impl GenericFilter {
    /// Rendered filter text for one domain.
    pub fn render(&self, kind: StreamKind) -> String {
        match kind {
            StreamKind::Video => self.params.render(&self.name),
            StreamKind::Audio => {
                let name = self.audio_name.as_deref().unwrap_or(&self.name);
                self.audio_params
                    .as_ref()
                    .unwrap_or(&self.params)
                    .render(name)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/model.rs"]
mod tests;
