//! Recipe tree normalization: generic YAML values into an [`EditGraph`] arena.
//!
//! Grammar (per node):
//! - a string is a source file;
//! - a sequence is a concat of its elements;
//! - a single-key mapping whose key is a node kind (`clip`, `concat`, `filter`, `scale`, `speed`,
//!   `tempo`, `fadein`, `fadeout`, `addaudio`, `ref`) builds that node;
//! - any other mapping is a source with `file` / `start` / `duration`;
//! - `{ref: name}` or `!ref name` is the node defined under top-level key `name`.
//!
//! Named definitions are normalized once and memoized by name, so every reference to a name yields
//! the same [`NodeId`]. YAML anchors work the same way: an anchored value and each of its aliases
//! normalize to one node.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};

use crate::{
    foundation::core::{NodeId, StreamOverrides},
    foundation::error::{RecipeError, RecipeResult},
    recipe::anchors::AnchorTable,
    recipe::model::{
        AddAudioNode, AudioMix, ConcatNode, EditGraph, EditNode, FilterNode, FilterParams,
        GenericFilter, NodeKind, Rate, Source, StreamSelector, SubFilter, Trim,
    },
};

const NODE_KINDS: [&str; 10] = [
    "clip", "concat", "filter", "scale", "speed", "tempo", "fadein", "fadeout", "addaudio", "ref",
];

/// Implicit modifier keys on source and concat mappings, in application order.
const MODIFIER_ORDER: [&str; 6] = ["scale", "speed", "addaudio", "tempo", "fadein", "fadeout"];

const SOURCE_KEYS: [&str; 7] = ["file", "start", "duration", "v", "a", "t", "filters"];
const CONCAT_KEYS: [&str; 5] = ["inputs", "v", "a", "t", "filters"];

/// Fade length used when `fadein` / `fadeout` carry no duration.
pub const DEFAULT_FADE_SECS: f64 = 3.0;

pub(crate) struct Normalizer<'r> {
    defs: &'r Mapping,
    reserved: &'r [&'r str],
    anchors: &'r AnchorTable,
    graph: EditGraph,
    named: HashMap<String, NodeId>,
    anchored: HashMap<usize, NodeId>,
    stack: Vec<String>,
}

/// One parsed link of a modifier chain.
enum Link {
    Sub(SubFilter),
    Mix(AudioMix),
}

/// Options of a node kind: positional (scalar or sequence) or named (mapping).
enum Options<'v> {
    Positional(Vec<&'v Value>),
    Named(&'v Mapping),
}

impl<'v> Options<'v> {
    fn of(value: &'v Value) -> Self {
        match value {
            Value::Null => Self::Positional(vec![]),
            Value::Sequence(items) => Self::Positional(items.iter().collect()),
            Value::Mapping(map) => Self::Named(map),
            other => Self::Positional(vec![other]),
        }
    }

    fn get(&self, index: usize, name: &str) -> Option<&'v Value> {
        match self {
            Self::Positional(items) => items.get(index).copied(),
            Self::Named(map) => map.get(name),
        }
    }

    fn named(&self, name: &str) -> Option<&'v Value> {
        match self {
            Self::Positional(_) => None,
            Self::Named(map) => map.get(name),
        }
    }

    fn overrides(&self, at: &str) -> RecipeResult<StreamOverrides> {
        match self {
            Self::Positional(_) => Ok(StreamOverrides::default()),
            Self::Named(map) => overrides(map, at),
        }
    }
}

impl<'r> Normalizer<'r> {
    pub(crate) fn new(
        defs: &'r Mapping,
        reserved: &'r [&'r str],
        anchors: &'r AnchorTable,
    ) -> Self {
        Self {
            defs,
            reserved,
            anchors,
            graph: EditGraph::new(),
            named: HashMap::new(),
            anchored: HashMap::new(),
            stack: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> EditGraph {
        self.graph
    }

    /// Node defined under a top-level key, normalized at most once.
    pub(crate) fn reference(&mut self, name: &str) -> RecipeResult<NodeId> {
        if let Some(id) = self.named.get(name) {
            return Ok(*id);
        }
        if self.stack.iter().any(|n| n == name) {
            return Err(RecipeError::CyclicReference(name.to_string()));
        }
        if self.reserved.contains(&name) {
            return Err(RecipeError::unresolved(name));
        }
        let defs = self.defs;
        let value = defs
            .get(name)
            .ok_or_else(|| RecipeError::unresolved(name))?;

        self.stack.push(name.to_string());
        let id = self.node(value, name);
        self.stack.pop();

        let id = id?;
        self.named.insert(name.to_string(), id);
        Ok(id)
    }

    /// Node for `value`; an anchored value and all of its aliases share one node.
    fn node(&mut self, value: &Value, path: &str) -> RecipeResult<NodeId> {
        let Some(anchor) = self.anchors.get(&std::ptr::from_ref(value)).copied() else {
            return self.fresh(value, path);
        };
        if let Some(id) = self.anchored.get(&anchor) {
            return Ok(*id);
        }
        let id = self.fresh(value, path)?;
        self.anchored.insert(anchor, id);
        Ok(id)
    }

    fn fresh(&mut self, value: &Value, path: &str) -> RecipeResult<NodeId> {
        match value {
            Value::String(file) => Ok(self.source(file, Trim::default(), path)),
            Value::Sequence(items) => self.concat_of(items, path),
            Value::Tagged(tagged) if tagged.tag == "ref" => {
                let name = tagged.value.as_str().ok_or_else(|| {
                    RecipeError::malformed(path, "!ref expects a definition name")
                })?;
                self.reference(name)
            }
            Value::Mapping(map) => {
                if map.len() == 1 {
                    if let Some((Value::String(kind), options)) = map.iter().next() {
                        if NODE_KINDS.contains(&kind.as_str()) {
                            return self.kind(kind, options, &format!("{path}.{kind}"));
                        }
                    }
                }
                self.source_mapping(map, path)
            }
            other => Err(RecipeError::malformed(
                path,
                format!(
                    "expected a file name, sequence or mapping, got {}",
                    describe(other)
                ),
            )),
        }
    }

    fn kind(&mut self, kind: &str, options: &Value, at: &str) -> RecipeResult<NodeId> {
        match kind {
            "ref" => {
                let name = options
                    .as_str()
                    .ok_or_else(|| RecipeError::malformed(at, "ref expects a definition name"))?;
                self.reference(name)
            }
            "clip" => match options {
                Value::String(file) => Ok(self.source(file, Trim::default(), at)),
                Value::Mapping(map) => self.source_mapping(map, at),
                Value::Sequence(items) => {
                    let file = items
                        .first()
                        .ok_or_else(|| RecipeError::malformed(at, "clip needs a file"))?;
                    let file = string(file, at)?;
                    let trim = Trim {
                        start: items.get(1).map(|v| time(v, at)).transpose()?,
                        duration: items.get(2).map(|v| time(v, at)).transpose()?,
                    };
                    Ok(self.source(&file, trim, at))
                }
                other => Err(RecipeError::malformed(
                    at,
                    format!("clip expects a file or mapping, got {}", describe(other)),
                )),
            },
            "concat" => match options {
                Value::Sequence(items) => self.concat_of(items, at),
                Value::Mapping(map) => self.concat_mapping(map, at),
                other => Err(RecipeError::malformed(
                    at,
                    format!("concat expects a sequence or mapping, got {}", describe(other)),
                )),
            },
            _ => self.standalone(kind, options, at),
        }
    }

    /// `{speed: {input: x, speed: 2x}}`, `{addaudio: [x, music.mp3]}` and friends.
    fn standalone(&mut self, kind: &str, options: &Value, at: &str) -> RecipeResult<NodeId> {
        let opts = Options::of(options);
        let input = opts
            .get(0, "input")
            .ok_or_else(|| RecipeError::malformed(at, format!("{kind} needs an `input` node")))?;
        let input = self.node(input, &format!("{at}.input"))?;
        // A generic filter carries its own v/a/t.
        let streams = if kind == "filter" {
            StreamOverrides::default()
        } else {
            opts.overrides(at)?
        };

        let kind = match self.link(kind, &opts, 1, at)? {
            Link::Sub(sub) => NodeKind::Filter(FilterNode {
                input,
                filters: vec![sub],
            }),
            Link::Mix(mix) => NodeKind::AddAudio(AddAudioNode { input, mix }),
        };
        Ok(self
            .graph
            .add(EditNode::new(kind, at).with_overrides(streams)))
    }

    fn source(&mut self, file: &str, trim: Trim, path: &str) -> NodeId {
        self.graph.add(EditNode::new(
            NodeKind::Source(Source {
                file: file.to_string(),
                trim,
            }),
            path,
        ))
    }

    fn source_mapping(&mut self, map: &Mapping, path: &str) -> RecipeResult<NodeId> {
        check_keys(map, &SOURCE_KEYS, path)?;
        let file = map
            .get("file")
            .ok_or_else(|| RecipeError::malformed(path, "source mapping needs a `file` key"))?;
        let file = string(file, &format!("{path}.file"))?;
        let trim = Trim {
            start: map
                .get("start")
                .map(|v| time(v, &format!("{path}.start")))
                .transpose()?,
            duration: map
                .get("duration")
                .map(|v| time(v, &format!("{path}.duration")))
                .transpose()?,
        };
        let id = self.source(&file, trim, path);
        self.graph.node_mut(id).streams = overrides(map, path)?;
        self.modifiers(id, map, path, false)
    }

    fn concat_of(&mut self, items: &[Value], path: &str) -> RecipeResult<NodeId> {
        let inputs = self.concat_inputs(items, path)?;
        Ok(self.graph.add(EditNode::new(
            NodeKind::Concat(ConcatNode {
                inputs,
                fadein: None,
                fadeout: None,
                addaudio: None,
            }),
            path,
        )))
    }

    fn concat_inputs(&mut self, items: &[Value], path: &str) -> RecipeResult<Vec<NodeId>> {
        if items.is_empty() {
            return Err(RecipeError::malformed(
                path,
                "concat needs at least one input",
            ));
        }
        items
            .iter()
            .enumerate()
            .map(|(i, v)| self.node(v, &format!("{path}[{i}]")))
            .collect()
    }

    fn concat_mapping(&mut self, map: &Mapping, path: &str) -> RecipeResult<NodeId> {
        check_keys(map, &CONCAT_KEYS, path)?;
        let items = match map.get("inputs") {
            Some(Value::Sequence(items)) => items,
            Some(other) => {
                return Err(RecipeError::malformed(
                    format!("{path}.inputs"),
                    format!("expected a sequence, got {}", describe(other)),
                ));
            }
            None => return Err(RecipeError::malformed(path, "concat needs `inputs`")),
        };
        let inputs = self.concat_inputs(items, &format!("{path}.inputs"))?;
        let fadein = map
            .get("fadein")
            .map(|v| fade_len(v, &format!("{path}.fadein")))
            .transpose()?;
        let fadeout = map
            .get("fadeout")
            .map(|v| fade_len(v, &format!("{path}.fadeout")))
            .transpose()?;
        let addaudio = match map.get("addaudio") {
            Some(v) => {
                let at = format!("{path}.addaudio");
                Some(self.audio_mix(&Options::of(v), 0, &at)?)
            }
            None => None,
        };

        let node = EditNode::new(
            NodeKind::Concat(ConcatNode {
                inputs,
                fadein,
                fadeout,
                addaudio,
            }),
            path,
        )
        .with_overrides(overrides(map, path)?);
        let id = self.graph.add(node);
        self.modifiers(id, map, path, true)
    }

    /// Wrap `base` in the implicit modifiers and the `filters:` list of `map`.
    ///
    /// Consecutive sub-filters share one filter node; `addaudio` closes the current chain. On a
    /// concat, `fadein` / `fadeout` / `addaudio` are concat fields and are skipped here.
    fn modifiers(
        &mut self,
        base: NodeId,
        map: &Mapping,
        path: &str,
        concat: bool,
    ) -> RecipeResult<NodeId> {
        let mut current = base;
        let mut chain = Vec::new();

        for key in MODIFIER_ORDER {
            let Some(value) = map.get(key) else {
                continue;
            };
            if concat && matches!(key, "addaudio" | "fadein" | "fadeout") {
                continue;
            }
            let at = format!("{path}.{key}");
            let link = self.link(key, &Options::of(value), 0, &at)?;
            current = self.push_link(current, &mut chain, link, path);
        }

        if let Some(list) = map.get("filters") {
            let at = format!("{path}.filters");
            let Value::Sequence(items) = list else {
                return Err(RecipeError::malformed(at, "expected a sequence of filters"));
            };
            for (i, item) in items.iter().enumerate() {
                let item_at = format!("{at}[{i}]");
                let link = self.listed(item, &item_at)?;
                current = self.push_link(current, &mut chain, link, path);
            }
        }

        Ok(self.flush(current, &mut chain, path))
    }

    fn listed(&mut self, item: &Value, at: &str) -> RecipeResult<Link> {
        match item {
            Value::String(name) => Ok(Link::Sub(SubFilter::Generic(GenericFilter {
                name: name.clone(),
                ..GenericFilter::default()
            }))),
            Value::Mapping(map) if map.len() == 1 => {
                let Some((key, options)) = map.iter().next() else {
                    return Err(RecipeError::malformed(at, "empty filter entry"));
                };
                let key = string(key, at)?;
                self.link(&key, &Options::of(options), 0, &format!("{at}.{key}"))
            }
            other => Err(RecipeError::malformed(
                at,
                format!(
                    "expected a filter name or single-key mapping, got {}",
                    describe(other)
                ),
            )),
        }
    }

    fn push_link(
        &mut self,
        current: NodeId,
        chain: &mut Vec<SubFilter>,
        link: Link,
        path: &str,
    ) -> NodeId {
        match link {
            Link::Sub(sub) => {
                chain.push(sub);
                current
            }
            Link::Mix(mix) => {
                let input = self.flush(current, chain, path);
                self.graph.add(EditNode::new(
                    NodeKind::AddAudio(AddAudioNode { input, mix }),
                    path,
                ))
            }
        }
    }

    fn flush(&mut self, current: NodeId, chain: &mut Vec<SubFilter>, path: &str) -> NodeId {
        if chain.is_empty() {
            return current;
        }
        self.graph.add(EditNode::new(
            NodeKind::Filter(FilterNode {
                input: current,
                filters: std::mem::take(chain),
            }),
            path,
        ))
    }

    /// Parse one modifier / filter kind; its parameters start at positional `base`.
    fn link(&mut self, kind: &str, opts: &Options<'_>, base: usize, at: &str) -> RecipeResult<Link> {
        let sub = match kind {
            "scale" => {
                let v = opts
                    .get(base, "scale")
                    .ok_or_else(|| RecipeError::malformed(at, "scale needs a size"))?;
                let (width, height) = scale(v, at)?;
                SubFilter::Scale { width, height }
            }
            "speed" => SubFilter::Speed(rate(required(opts.get(base, "speed"), at)?, at)?),
            "tempo" => {
                let v = opts.get(base, "tempo").or_else(|| opts.named("speed"));
                SubFilter::Tempo(rate(required(v, at)?, at)?)
            }
            "fadein" => SubFilter::FadeIn(
                opts.get(base, "duration")
                    .map(|v| fade_len(v, at))
                    .transpose()?
                    .unwrap_or(DEFAULT_FADE_SECS),
            ),
            "fadeout" => SubFilter::FadeOut(
                opts.get(base, "duration")
                    .map(|v| fade_len(v, at))
                    .transpose()?
                    .unwrap_or(DEFAULT_FADE_SECS),
            ),
            "filter" => SubFilter::Generic(generic(opts, base, at)?),
            "addaudio" => return Ok(Link::Mix(self.audio_mix(opts, base, at)?)),
            other => {
                return Err(RecipeError::malformed(
                    at,
                    format!("unknown filter kind `{other}`"),
                ));
            }
        };
        Ok(Link::Sub(sub))
    }

    fn audio_mix(&mut self, opts: &Options<'_>, base: usize, at: &str) -> RecipeResult<AudioMix> {
        let audio = opts
            .get(base, "audio")
            .ok_or_else(|| RecipeError::malformed(at, "addaudio needs an `audio` node"))?;
        let audio = self.node(audio, &format!("{at}.audio"))?;
        Ok(AudioMix {
            audio,
            params: FilterParams {
                args: opts
                    .named("args")
                    .map(|v| scalar_list(v, at))
                    .transpose()?
                    .unwrap_or_default(),
                kwargs: opts
                    .named("kwargs")
                    .map(|v| kwargs(v, at))
                    .transpose()?
                    .unwrap_or_default(),
            },
        })
    }
}

fn generic(opts: &Options<'_>, base: usize, at: &str) -> RecipeResult<GenericFilter> {
    let name = string(required(opts.get(base, "name"), at)?, at)?;
    let args = opts
        .get(base + 1, "args")
        .map(|v| scalar_list(v, at))
        .transpose()?
        .unwrap_or_default();
    let kw = opts
        .named("kwargs")
        .map(|v| kwargs(v, at))
        .transpose()?
        .unwrap_or_default();
    let selector = opts
        .named("type")
        .map(|v| selector(v, at))
        .transpose()?
        .unwrap_or_default();
    let audio_name = opts.named("aname").map(|v| string(v, at)).transpose()?;
    let audio_args = opts.named("aargs").map(|v| scalar_list(v, at)).transpose()?;
    let audio_kwargs = opts.named("akwargs").map(|v| kwargs(v, at)).transpose()?;
    let audio_params = if audio_args.is_some() || audio_kwargs.is_some() {
        Some(FilterParams {
            args: audio_args.unwrap_or_else(|| args.clone()),
            kwargs: audio_kwargs.unwrap_or_else(|| kw.clone()),
        })
    } else {
        None
    };

    Ok(GenericFilter {
        name,
        params: FilterParams { args, kwargs: kw },
        selector,
        audio_name,
        audio_params,
        overrides: opts.overrides(at)?,
    })
}

fn check_keys(map: &Mapping, allowed: &[&str], path: &str) -> RecipeResult<()> {
    for (key, _) in map {
        let key = string(key, path)?;
        if !allowed.contains(&key.as_str()) && !MODIFIER_ORDER.contains(&key.as_str()) {
            return Err(RecipeError::malformed(path, format!("unknown key `{key}`")));
        }
    }
    Ok(())
}

fn overrides(map: &Mapping, path: &str) -> RecipeResult<StreamOverrides> {
    Ok(StreamOverrides {
        video: map
            .get("v")
            .map(|v| count(v, &format!("{path}.v")))
            .transpose()?,
        audio: map
            .get("a")
            .map(|v| count(v, &format!("{path}.a")))
            .transpose()?,
        duration: map
            .get("t")
            .map(|v| time(v, &format!("{path}.t")))
            .transpose()?,
    })
}

fn required<'v>(value: Option<&'v Value>, at: &str) -> RecipeResult<&'v Value> {
    value.ok_or_else(|| RecipeError::malformed(at, "missing required parameter"))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn string(value: &Value, at: &str) -> RecipeResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RecipeError::malformed(at, format!("expected a string, got {}", describe(value))))
}

/// Scalar rendered as a filter or command-line option.
pub(crate) fn scalar_string(value: &Value, at: &str) -> RecipeResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RecipeError::malformed(
            at,
            format!("expected a scalar, got {}", describe(other)),
        )),
    }
}

fn scalar_list(value: &Value, at: &str) -> RecipeResult<Vec<String>> {
    match value {
        Value::Null => Ok(vec![]),
        Value::Sequence(items) => items.iter().map(|v| scalar_string(v, at)).collect(),
        other => Ok(vec![scalar_string(other, at)?]),
    }
}

fn kwargs(value: &Value, at: &str) -> RecipeResult<Vec<(String, String)>> {
    let Value::Mapping(map) = value else {
        return Err(RecipeError::malformed(at, "kwargs must be a mapping"));
    };
    map.iter()
        .map(|(k, v)| Ok((string(k, at)?, scalar_string(v, at)?)))
        .collect()
}

fn number(value: &Value, at: &str) -> RecipeResult<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
        .ok_or_else(|| RecipeError::malformed(at, format!("expected a number, got {}", describe(value))))
}

fn time(value: &Value, at: &str) -> RecipeResult<f64> {
    let t = number(value, at)?;
    if t < 0.0 {
        return Err(RecipeError::malformed(at, "time must be non-negative"));
    }
    Ok(t)
}

fn fade_len(value: &Value, at: &str) -> RecipeResult<f64> {
    match value {
        Value::Null => Ok(DEFAULT_FADE_SECS),
        Value::Mapping(map) => map
            .get("duration")
            .map(|v| time(v, at))
            .transpose()
            .map(|d| d.unwrap_or(DEFAULT_FADE_SECS)),
        other => time(other, at),
    }
}

fn count(value: &Value, at: &str) -> RecipeResult<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| RecipeError::malformed(at, "stream count must be a non-negative integer"))
}

/// `"2x"` is a factor, a plain number a target duration in seconds.
fn rate(value: &Value, at: &str) -> RecipeResult<Rate> {
    let rate = match value.as_str().map(str::trim) {
        Some(s) if s.ends_with('x') => {
            let factor = s[..s.len() - 1].trim().parse::<f64>().map_err(|_| {
                RecipeError::malformed(at, format!("invalid speed factor `{s}`"))
            })?;
            Rate::Factor(factor)
        }
        _ => Rate::TargetDuration(number(value, at)?),
    };
    let v = match rate {
        Rate::Factor(v) | Rate::TargetDuration(v) => v,
    };
    if !v.is_finite() || v <= 0.0 {
        return Err(RecipeError::malformed(at, "speed must be positive"));
    }
    Ok(rate)
}

fn dimension(value: &Value, at: &str) -> RecipeResult<i64> {
    let d = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    d.ok_or_else(|| RecipeError::malformed(at, "scale dimensions must be integers"))
}

fn scale(value: &Value, at: &str) -> RecipeResult<(i64, i64)> {
    match value {
        Value::String(s) => match s.split_once('x') {
            Some((w, h)) => Ok((
                dimension(&Value::String(w.to_string()), at)?,
                dimension(&Value::String(h.to_string()), at)?,
            )),
            None => {
                let n = dimension(value, at)?;
                Ok((n, n))
            }
        },
        Value::Number(_) => {
            let n = dimension(value, at)?;
            Ok((n, n))
        }
        Value::Sequence(items) if items.len() == 2 => {
            Ok((dimension(&items[0], at)?, dimension(&items[1], at)?))
        }
        _ => Err(RecipeError::malformed(
            at,
            "scale expects `WxH`, a single size or [W, H]",
        )),
    }
}

fn selector(value: &Value, at: &str) -> RecipeResult<StreamSelector> {
    match value.as_str() {
        Some("v" | "video") => Ok(StreamSelector::Video),
        Some("a" | "audio") => Ok(StreamSelector::Audio),
        Some("av" | "va" | "both") => Ok(StreamSelector::Both),
        _ => Err(RecipeError::malformed(
            at,
            "filter type must be `v`, `a` or `av`",
        )),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/normalize.rs"]
mod tests;
