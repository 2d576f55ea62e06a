use crate::{
    foundation::core::{NodeId, Streams},
    foundation::error::{RecipeError, RecipeResult},
    probe::ffprobe::{Probe, ProbeInfo},
    recipe::model::{EditGraph, NodeKind, Rate, SubFilter, Trim},
};

/// Resolved metadata for every node reached by a [`Resolver`], keyed by node identity.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    table: Vec<Option<Streams>>,
}

impl Resolution {
    /// Metadata of `id`, if it was resolved.
    pub fn get(&self, id: NodeId) -> Option<Streams> {
        self.table.get(id.0).copied().flatten()
    }

    pub(crate) fn require(&self, graph: &EditGraph, id: NodeId) -> RecipeResult<Streams> {
        self.get(id).ok_or_else(|| {
            RecipeError::Other(anyhow::anyhow!(
                "node '{}' was compiled before being resolved",
                graph.node(id).origin
            ))
        })
    }
}

/// Bottom-up, memoized metadata resolution over an [`EditGraph`].
///
/// Each node is computed at most once regardless of fan-in; later calls return the cached value.
/// The probe is called once per source node, so wrap it in a
/// [`CachedProbe`](crate::CachedProbe) to also collapse repeated files.
pub struct Resolver<'a> {
    graph: &'a EditGraph,
    probe: &'a mut dyn Probe,
    table: Vec<Option<Streams>>,
    computed: usize,
}

impl<'a> Resolver<'a> {
    /// Resolver over `graph` reading leaf metadata from `probe`.
    pub fn new(graph: &'a EditGraph, probe: &'a mut dyn Probe) -> Self {
        Self {
            graph,
            probe,
            table: vec![None; graph.len()],
            computed: 0,
        }
    }

    /// Number of nodes actually computed so far (cache hits excluded).
    pub fn computed(&self) -> usize {
        self.computed
    }

    /// Resolve `id` and, first, everything it depends on.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn resolve(&mut self, id: NodeId) -> RecipeResult<Streams> {
        if let Some(cached) = self.table[id.0] {
            return Ok(cached);
        }

        let graph = self.graph;
        let node = graph.node(id);
        let computed = match &node.kind {
            NodeKind::Source(src) => {
                let info = self.probe.probe(&src.file)?;
                trimmed(info, src.trim)
            }
            NodeKind::Filter(f) => {
                let mut meta = self.resolve(f.input)?;
                for sub in &f.filters {
                    meta = step(meta, sub, &node.origin)?;
                }
                meta
            }
            NodeKind::Concat(c) => {
                let mut children = Vec::with_capacity(c.inputs.len());
                for input in &c.inputs {
                    children.push(self.resolve(*input)?);
                }
                let joined = Streams::new(
                    children.iter().map(|s| s.video).min().unwrap_or(0),
                    children.iter().map(|s| s.audio).min().unwrap_or(0),
                    children.iter().map(|s| s.duration).sum(),
                );
                match &c.addaudio {
                    Some(mix) => {
                        let aux = self.resolve(mix.audio)?;
                        mixed(joined, aux)
                    }
                    None => joined,
                }
            }
            NodeKind::AddAudio(a) => {
                let primary = self.resolve(a.input)?;
                let aux = self.resolve(a.mix.audio)?;
                mixed(primary, aux)
            }
        };

        let resolved = node.streams.apply(computed);
        tracing::trace!(origin = %node.origin, ?resolved, "resolved");
        self.table[id.0] = Some(resolved);
        self.computed += 1;
        Ok(resolved)
    }

    /// Hand the memo table over to the compilation pass.
    pub fn finish(self) -> Resolution {
        Resolution { table: self.table }
    }
}

/// Probed metadata narrowed by a trim window.
fn trimmed(info: ProbeInfo, trim: Trim) -> Streams {
    let probed = info.duration;
    let duration = match (trim.start, trim.duration) {
        (Some(start), Some(len)) => (probed - start).min(len),
        (Some(start), None) => probed - start,
        (None, Some(len)) => len.min(probed),
        (None, None) => probed,
    };
    Streams::new(info.video, info.audio, duration)
}

/// Primary metadata after mixing auxiliary audio in: mixing never adds channels, except that a
/// primary without audio takes the auxiliary streams as they are.
fn mixed(primary: Streams, aux: Streams) -> Streams {
    let audio = if primary.audio == 0 {
        aux.audio
    } else {
        primary.audio
    };
    Streams::new(primary.video, audio, primary.duration)
}

/// Metadata after one sub-filter.
pub(crate) fn step(meta: Streams, sub: &SubFilter, origin: &str) -> RecipeResult<Streams> {
    Ok(match sub {
        SubFilter::Speed(rate) => {
            let factor = effective_factor(*rate, meta.duration, origin)?;
            Streams::new(meta.video, meta.audio, meta.duration / factor)
        }
        SubFilter::Tempo(rate) => {
            let factor = effective_factor(*rate, meta.duration, origin)?;
            // Duration follows the video timeline whenever there is one.
            if meta.video == 0 {
                Streams::new(meta.video, meta.audio, meta.duration / factor)
            } else {
                meta
            }
        }
        SubFilter::FadeIn(_) | SubFilter::FadeOut(_) | SubFilter::Scale { .. } => meta,
        SubFilter::Generic(g) => g.overrides.apply(meta),
    })
}

pub(crate) fn effective_factor(rate: Rate, input_duration: f64, origin: &str) -> RecipeResult<f64> {
    let factor = rate.factor(input_duration);
    if !factor.is_finite() || factor <= 0.0 {
        return Err(RecipeError::malformed(
            origin,
            format!("speed factor {factor} is not positive (input duration {input_duration}s)"),
        ));
    }
    Ok(factor)
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/resolver.rs"]
mod tests;
