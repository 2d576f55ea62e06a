//! ffrecipe compiles declarative YAML edit recipes into a single `ffmpeg` invocation.
//!
//! A recipe is a mapping of named nodes (clips, concatenations, filter chains, audio mixes).
//! Building one target goes through four passes:
//!
//! 1. **Normalize**: `Recipe + target -> EditTree`, an arena of typed nodes where every shared
//!    sub-tree (`!ref name`) keeps a single identity.
//! 2. **Resolve**: bottom-up, memoized stream metadata (video count, audio count, duration) per
//!    node, with leaf metadata from a [`Probe`] and explicit `v` / `a` / `t` overrides on top.
//! 3. **Compile**: memoized lowering into labeled filter-graph segments; each node is emitted
//!    once and its labels are reused by every consumer.
//! 4. **Assemble**: flags, `-i` inputs, `-filter_complex`, `-map` per root stream and output
//!    arguments, in that order.
//!
//! Only [`build()`] ever starts the processing tool, and not in dry mode.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod build;
mod command;
mod compile;
mod foundation;
mod probe;
mod recipe;
mod resolve;

pub use build::{BuildOptions, build, compile_target};
pub use command::assemble::{FfmpegCommand, assemble, shell_quote};
pub use command::run::{run_command, tool_available};
pub use compile::compiler::{CompiledGraph, Compiler, OutputLabels};
pub use compile::graph::{FilterGraph, Segment};
pub use compile::labels::{Label, LabelAllocator};
pub use foundation::core::{NodeId, StreamKind, StreamOverrides, Streams};
pub use foundation::error::{RecipeError, RecipeResult};
pub use probe::ffprobe::{
    CachedProbe, FfprobeProbe, Probe, ProbeInfo, StaticProbe, parse_ffprobe_json,
};
pub use recipe::document::{
    DEFAULT_FLAGS, DEFAULT_FLAGS_KEY, DEFAULT_OUTPUT, DEFAULT_OUTPUT_KEY, DEFAULT_TARGET,
    EditTree, Recipe, SectionKeys,
};
pub use recipe::model::{
    AddAudioNode, AudioMix, ConcatNode, EditGraph, EditNode, FilterNode, FilterParams,
    GenericFilter, NodeKind, Rate, Source, StreamSelector, SubFilter, Trim,
};
pub use resolve::resolver::{Resolution, Resolver};
