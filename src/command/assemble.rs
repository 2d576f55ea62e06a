use std::fmt;

use crate::compile::compiler::CompiledGraph;

/// Final processing-tool invocation: program plus ordered arguments.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FfmpegCommand {
    /// Binary name or path.
    pub program: String,
    /// Arguments in the fixed order: flags, inputs, filter graph, maps, output.
    pub args: Vec<String>,
}

impl FfmpegCommand {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Shell-quoted command line, suitable for copy and paste.
impl fmt::Display for FfmpegCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.argv().iter().map(|a| shell_quote(a)).collect();
        f.write_str(&quoted.join(" "))
    }
}

/// Assemble the argument list for a compiled target.
///
/// Shared filter outputs are split and unused ones sunk first so every pad is linked once, then the pieces are laid
/// out as `flags`, `-i` per input, `-filter_complex` (omitted for an empty graph), `-map` per
/// root label and `output`.
pub fn assemble(
    compiled: CompiledGraph,
    flags: &[String],
    output: &[String],
    program: &str,
) -> FfmpegCommand {
    let CompiledGraph {
        inputs,
        graph,
        outputs,
        mut labels,
    } = compiled;
    let (graph, maps) = graph.expand_fanout(outputs.all(), &mut labels);

    let mut args: Vec<String> = flags.to_vec();
    for file in inputs {
        args.push("-i".to_string());
        args.push(file);
    }
    if !graph.is_empty() {
        args.push("-filter_complex".to_string());
        args.push(graph.render());
    }
    for label in &maps {
        args.push("-map".to_string());
        args.push(label.map_arg());
    }
    args.extend(output.iter().cloned());

    let cmd = FfmpegCommand {
        program: program.to_string(),
        args,
    };
    tracing::info!(segments = graph.len(), maps = maps.len(), "assembled command");
    cmd
}

/// POSIX single-quote `arg` unless it only holds characters the shell leaves alone.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/command/assemble.rs"]
mod tests;
