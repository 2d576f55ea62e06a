use std::collections::HashMap;

use crate::{
    compile::graph::{FilterGraph, Segment},
    compile::labels::{Label, LabelAllocator},
    foundation::core::{NodeId, StreamKind, Streams, fmt_num},
    foundation::error::{RecipeError, RecipeResult},
    recipe::model::{
        AudioMix, ConcatNode, EditGraph, FilterNode, FilterParams, NodeKind, Source, SubFilter,
    },
    resolve::resolver::{Resolution, effective_factor, step},
};

/// Stream handles produced by one compiled node: video first, then audio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputLabels {
    /// Video stream labels in declaration order.
    pub video: Vec<Label>,
    /// Audio stream labels in declaration order.
    pub audio: Vec<Label>,
}

impl OutputLabels {
    /// Labels of one domain.
    pub fn of(&self, kind: StreamKind) -> &[Label] {
        match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
        }
    }

    /// All labels, video first.
    pub fn all(&self) -> Vec<Label> {
        self.video.iter().chain(self.audio.iter()).cloned().collect()
    }

    /// Total number of labels.
    pub fn len(&self) -> usize {
        self.video.len() + self.audio.len()
    }

    /// Whether the node produced no streams at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of lowering one target: pipeline inputs, emitted segments and the root's labels.
#[derive(Debug)]
pub struct CompiledGraph {
    /// Distinct input files in registration order; the position is the input index.
    pub inputs: Vec<String>,
    /// Emitted segments in first-compiled order.
    pub graph: FilterGraph,
    /// Labels of the compiled root.
    pub outputs: OutputLabels,
    /// Allocator state, so later passes keep minting unique labels.
    pub labels: LabelAllocator,
}

/// Memoized lowering of a resolved [`EditGraph`] into filter-graph segments.
///
/// Every node is compiled once; a shared sub-tree hands the same labels to each consumer.
pub struct Compiler<'a> {
    graph: &'a EditGraph,
    resolution: &'a Resolution,
    labels: LabelAllocator,
    inputs: Vec<String>,
    input_index: HashMap<String, usize>,
    segments: FilterGraph,
    compiled: Vec<Option<OutputLabels>>,
}

impl<'a> Compiler<'a> {
    /// Compiler over a graph whose reachable nodes are present in `resolution`.
    pub fn new(graph: &'a EditGraph, resolution: &'a Resolution) -> Self {
        Self {
            graph,
            resolution,
            labels: LabelAllocator::new(),
            inputs: Vec::new(),
            input_index: HashMap::new(),
            segments: FilterGraph::new(),
            compiled: vec![None; graph.len()],
        }
    }

    /// Segments emitted so far.
    pub fn segments(&self) -> &FilterGraph {
        &self.segments
    }

    /// Compile `id` after its inputs and return its output labels.
    pub fn compile(&mut self, id: NodeId) -> RecipeResult<OutputLabels> {
        if let Some(done) = &self.compiled[id.0] {
            return Ok(done.clone());
        }

        let graph = self.graph;
        let node = graph.node(id);
        let meta = self.resolution.require(graph, id)?;
        let produced = match &node.kind {
            NodeKind::Source(src) => self.source(src, meta),
            NodeKind::Filter(f) => self.filter(f, &node.origin)?,
            NodeKind::Concat(c) => self.concat(c, meta, id)?,
            NodeKind::AddAudio(a) => {
                let primary = self.compile(a.input)?;
                let audio = self.mix(primary.audio, &a.mix, &node.origin)?;
                OutputLabels {
                    video: primary.video,
                    audio,
                }
            }
        };

        let out = fit(produced, meta, &node.origin)?;
        self.compiled[id.0] = Some(out.clone());
        Ok(out)
    }

    /// Hand over everything needed to assemble the command for root `root`.
    pub fn finish(mut self, root: NodeId) -> RecipeResult<CompiledGraph> {
        let outputs = self.compile(root)?;
        Ok(CompiledGraph {
            inputs: self.inputs,
            graph: self.segments,
            outputs,
            labels: self.labels,
        })
    }

    fn register_input(&mut self, file: &str) -> usize {
        if let Some(idx) = self.input_index.get(file) {
            return *idx;
        }
        let idx = self.inputs.len();
        self.inputs.push(file.to_string());
        self.input_index.insert(file.to_string(), idx);
        idx
    }

    fn emit(&mut self, inputs: Vec<Label>, filter: String, outputs: Vec<Label>) {
        tracing::debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            filter = %filter,
            "segment"
        );
        self.segments.push(Segment {
            inputs,
            filter,
            outputs,
        });
    }

    /// One-in one-out segment on a fresh label of the same domain.
    fn chain(&mut self, input: Label, filter: String) -> Label {
        let out = self.labels.allocate(input.kind());
        self.emit(vec![input], filter, vec![out.clone()]);
        out
    }

    fn source(&mut self, src: &Source, meta: Streams) -> OutputLabels {
        let idx = self.register_input(&src.file);
        let mut out = OutputLabels {
            video: (0..meta.video)
                .map(|i| Label::input(idx, StreamKind::Video, i))
                .collect(),
            audio: (0..meta.audio)
                .map(|i| Label::input(idx, StreamKind::Audio, i))
                .collect(),
        };
        if src.trim.is_set() {
            let opts = src.trim.options();
            out.video = std::mem::take(&mut out.video)
                .into_iter()
                .map(|l| self.chain(l, format!("trim={opts},setpts=PTS-STARTPTS")))
                .collect();
            out.audio = std::mem::take(&mut out.audio)
                .into_iter()
                .map(|l| self.chain(l, format!("atrim={opts},asetpts=PTS-STARTPTS")))
                .collect();
        }
        out
    }

    fn filter(&mut self, f: &FilterNode, origin: &str) -> RecipeResult<OutputLabels> {
        let mut meta = self.resolution.require(self.graph, f.input)?;
        let mut current = self.compile(f.input)?;
        for sub in &f.filters {
            let next_meta = step(meta, sub, origin)?;
            let mut next = OutputLabels::default();
            for kind in [StreamKind::Video, StreamKind::Audio] {
                let labels = current.of(kind).to_vec();
                let produced = match sub_filter_text(sub, kind, meta, origin)? {
                    Some(text) => match declared_count(sub, kind) {
                        Some(n) => {
                            let outs = self.labels.allocate_many(kind, n);
                            self.emit(labels, text, outs.clone());
                            outs
                        }
                        None => labels
                            .into_iter()
                            .map(|l| self.chain(l, text.clone()))
                            .collect(),
                    },
                    None => {
                        let noop = match kind {
                            StreamKind::Video => "null",
                            StreamKind::Audio => "anull",
                        };
                        labels
                            .into_iter()
                            .map(|l| self.chain(l, noop.to_string()))
                            .collect()
                    }
                };
                match kind {
                    StreamKind::Video => next.video = produced,
                    StreamKind::Audio => next.audio = produced,
                }
            }
            current = fit(next, next_meta, origin)?;
            meta = next_meta;
        }
        Ok(current)
    }

    fn concat(&mut self, c: &ConcatNode, meta: Streams, id: NodeId) -> RecipeResult<OutputLabels> {
        let graph = self.graph;
        let node = graph.node(id);

        let mut children = Vec::with_capacity(c.inputs.len());
        for input in &c.inputs {
            let streams = self.resolution.require(graph, *input)?;
            children.push((*input, streams));
        }
        let video = node
            .streams
            .video
            .unwrap_or_else(|| children.iter().map(|(_, s)| s.video).min().unwrap_or(0));
        let audio = node
            .streams
            .audio
            .unwrap_or_else(|| children.iter().map(|(_, s)| s.audio).min().unwrap_or(0));

        let mut consumed = Vec::new();
        for (child, _) in &children {
            let labels = self.compile(*child)?;
            let origin = &graph.node(*child).origin;
            consumed.extend(take(&labels.video, video, origin, StreamKind::Video)?);
            consumed.extend(take(&labels.audio, audio, origin, StreamKind::Audio)?);
        }

        let mut out = OutputLabels {
            video: self.labels.allocate_many(StreamKind::Video, video),
            audio: self.labels.allocate_many(StreamKind::Audio, audio),
        };
        self.emit(
            consumed,
            format!("concat=n={}:v={video}:a={audio}", c.inputs.len()),
            out.all(),
        );

        let mut fades = Vec::new();
        if let Some(d) = c.fadein {
            fades.push(SubFilter::FadeIn(d));
        }
        if let Some(d) = c.fadeout {
            fades.push(SubFilter::FadeOut(d));
        }
        for fade in &fades {
            for kind in [StreamKind::Video, StreamKind::Audio] {
                let Some(text) = sub_filter_text(fade, kind, meta, &node.origin)? else {
                    continue;
                };
                let chained: Vec<Label> = out
                    .of(kind)
                    .to_vec()
                    .into_iter()
                    .map(|l| self.chain(l, text.clone()))
                    .collect();
                match kind {
                    StreamKind::Video => out.video = chained,
                    StreamKind::Audio => out.audio = chained,
                }
            }
        }

        if let Some(mix) = &c.addaudio {
            out.audio = self.mix(out.audio, mix, &node.origin)?;
        }
        Ok(out)
    }

    /// Mix the auxiliary node's audio onto `primary`, returning the new audio labels.
    ///
    /// One auxiliary stream mixes into every primary stream; several must pair up one to one.
    fn mix(
        &mut self,
        primary: Vec<Label>,
        mix: &AudioMix,
        origin: &str,
    ) -> RecipeResult<Vec<Label>> {
        let aux = self.compile(mix.audio)?.audio;
        if aux.is_empty() {
            return Err(RecipeError::out_of_range(
                &self.graph.node(mix.audio).origin,
                StreamKind::Audio,
                0,
                0,
            ));
        }
        if primary.is_empty() {
            return Ok(aux);
        }

        if aux.len() > 1 && aux.len() != primary.len() {
            let (more, fewer) = (aux.len().max(primary.len()), aux.len().min(primary.len()));
            return Err(RecipeError::out_of_range(origin, StreamKind::Audio, more - 1, fewer));
        }

        let filter = mix_params(&mix.params).render("amix");
        let elementwise = primary.len() == aux.len();
        let mut out = Vec::with_capacity(primary.len());
        for (i, p) in primary.into_iter().enumerate() {
            let a = if elementwise { aux[i].clone() } else { aux[0].clone() };
            let label = self.labels.allocate(StreamKind::Audio);
            self.emit(vec![p, a], filter.clone(), vec![label.clone()]);
            out.push(label);
        }
        Ok(out)
    }
}

/// `amix` defaults with the recipe's options applied on top.
fn mix_params(user: &FilterParams) -> FilterParams {
    let mut params = FilterParams::default();
    params.set("inputs", "2");
    params.set("duration", "first");
    params.args.extend(user.args.iter().cloned());
    for (k, v) in &user.kwargs {
        params.set(k.clone(), v.clone());
    }
    params
}

/// Filter text of `sub` for one domain, or `None` when the domain passes through.
fn sub_filter_text(
    sub: &SubFilter,
    kind: StreamKind,
    meta: Streams,
    origin: &str,
) -> RecipeResult<Option<String>> {
    if !sub.selector().includes(kind) {
        return Ok(None);
    }
    let prefix = match kind {
        StreamKind::Video => "",
        StreamKind::Audio => "a",
    };
    Ok(Some(match sub {
        SubFilter::Speed(rate) => {
            let factor = effective_factor(*rate, meta.duration, origin)?;
            format!("setpts=PTS*{}", fmt_num(1.0 / factor))
        }
        SubFilter::Tempo(rate) => {
            let factor = effective_factor(*rate, meta.duration, origin)?;
            format!("atempo={}", fmt_num(factor))
        }
        SubFilter::FadeIn(d) => format!("{prefix}fade=in:duration={}", fmt_num(*d)),
        SubFilter::FadeOut(d) => format!(
            "{prefix}fade=out:start_time={}:duration={}",
            fmt_num((meta.duration - d).max(0.0)),
            fmt_num(*d)
        ),
        SubFilter::Scale { width, height } => format!("scale={width}:{height}"),
        SubFilter::Generic(g) => g.render(kind),
    }))
}

/// Output count a generic filter declares for a domain it processes as a whole.
fn declared_count(sub: &SubFilter, kind: StreamKind) -> Option<usize> {
    match sub {
        SubFilter::Generic(g) => match kind {
            StreamKind::Video => g.overrides.video,
            StreamKind::Audio => g.overrides.audio,
        },
        _ => None,
    }
}

/// First `count` labels of one domain, or the index that is missing.
fn take(labels: &[Label], count: usize, origin: &str, kind: StreamKind) -> RecipeResult<Vec<Label>> {
    if labels.len() < count {
        return Err(RecipeError::out_of_range(origin, kind, labels.len(), labels.len()));
    }
    Ok(labels[..count].to_vec())
}

/// Narrow produced labels to the resolved counts.
fn fit(produced: OutputLabels, meta: Streams, origin: &str) -> RecipeResult<OutputLabels> {
    Ok(OutputLabels {
        video: take(&produced.video, meta.video, origin, StreamKind::Video)?,
        audio: take(&produced.audio, meta.audio, origin, StreamKind::Audio)?,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/compile/compiler.rs"]
mod tests;
