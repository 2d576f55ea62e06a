use std::path::PathBuf;

use crate::{
    command::assemble::{FfmpegCommand, assemble},
    command::run::run_command,
    compile::compiler::Compiler,
    foundation::error::RecipeResult,
    probe::ffprobe::{CachedProbe, FfprobeProbe, Probe},
    recipe::document::{
        DEFAULT_FLAGS_KEY, DEFAULT_OUTPUT_KEY, DEFAULT_TARGET, Recipe, SectionKeys,
    },
    resolve::resolver::Resolver,
};

/// Everything one build invocation needs besides the recipe itself.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Top-level key of the node to build.
    pub target: String,
    /// Directory the probe and processing tool run in; relative paths resolve against it.
    pub workdir: Option<PathBuf>,
    /// Key of the flags section.
    pub flags_key: String,
    /// Key of the output section.
    pub output_key: String,
    /// Probe and compile, but never start the processing tool.
    pub dry: bool,
    /// Processing tool binary.
    pub ffmpeg: String,
    /// Probing tool binary.
    pub ffprobe: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            workdir: None,
            flags_key: DEFAULT_FLAGS_KEY.to_string(),
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
            dry: false,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl BuildOptions {
    /// Section keys borrowed from these options.
    pub fn section_keys(&self) -> SectionKeys<'_> {
        SectionKeys {
            flags: &self.flags_key,
            output: &self.output_key,
        }
    }

    /// `ffprobe`-backed probe honoring the tool path and working directory.
    pub fn system_probe(&self) -> FfprobeProbe {
        let probe = FfprobeProbe::new(self.ffprobe.clone());
        match &self.workdir {
            Some(dir) => probe.with_workdir(dir.clone()),
            None => probe,
        }
    }
}

/// Normalize, resolve, compile and assemble one target into a command.
///
/// Each distinct file is probed once. Nothing is executed.
#[tracing::instrument(skip(recipe, opts, probe), fields(target = %opts.target))]
pub fn compile_target(
    recipe: &Recipe,
    opts: &BuildOptions,
    probe: &mut dyn Probe,
) -> RecipeResult<FfmpegCommand> {
    let keys = opts.section_keys();
    let flags = recipe.flags(keys)?;
    let output = recipe.output(keys)?;
    let tree = recipe.normalize(&opts.target, keys)?;

    let mut cached = CachedProbe::new(probe);
    let mut resolver = Resolver::new(&tree.graph, &mut cached);
    let root = resolver.resolve(tree.root)?;
    tracing::debug!(
        video = root.video,
        audio = root.audio,
        duration = root.duration,
        nodes = resolver.computed(),
        "resolved target"
    );
    let resolution = resolver.finish();

    let compiled = Compiler::new(&tree.graph, &resolution).finish(tree.root)?;
    Ok(assemble(compiled, &flags, &output, &opts.ffmpeg))
}

/// Compile a target, hand the command to `announce`, then run it unless `opts.dry` is set.
pub fn build(
    recipe: &Recipe,
    opts: &BuildOptions,
    probe: &mut dyn Probe,
    announce: impl FnOnce(&FfmpegCommand),
) -> RecipeResult<FfmpegCommand> {
    let cmd = compile_target(recipe, opts, probe)?;
    announce(&cmd);
    if opts.dry {
        tracing::info!("dry run, not starting {}", cmd.program);
    } else {
        run_command(&cmd, opts.workdir.as_deref())?;
    }
    Ok(cmd)
}

#[cfg(test)]
#[path = "../tests/unit/build.rs"]
mod tests;
