use std::{path::Path, process::Command};

use crate::{
    command::assemble::FfmpegCommand,
    foundation::error::{RecipeError, RecipeResult},
};

/// Run `cmd` to completion, inheriting stdio, from `workdir` when given.
#[tracing::instrument(skip(cmd), fields(program = %cmd.program))]
pub fn run_command(cmd: &FfmpegCommand, workdir: Option<&Path>) -> RecipeResult<()> {
    let mut proc = Command::new(&cmd.program);
    proc.args(&cmd.args);
    if let Some(dir) = workdir {
        proc.current_dir(dir);
    }

    let status = proc
        .status()
        .map_err(|e| RecipeError::process(format!("failed to spawn {}: {e}", cmd.program)))?;
    if !status.success() {
        return Err(RecipeError::process(format!(
            "{} exited with status {status}",
            cmd.program
        )));
    }
    tracing::debug!("process finished");
    Ok(())
}

/// Whether `program -version` runs successfully.
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/command/run.rs"]
mod tests;
