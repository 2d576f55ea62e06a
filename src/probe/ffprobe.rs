use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Command,
};

use crate::foundation::error::{RecipeError, RecipeResult};

/// Stream metadata reported for one media file.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct ProbeInfo {
    /// Number of video streams.
    pub video: usize,
    /// Number of audio streams.
    pub audio: usize,
    /// Longest stream duration in seconds (0 when unknown).
    pub duration: f64,
}

/// External metadata collaborator for source files.
pub trait Probe {
    /// Inspect `path` (as written in the recipe). Failures must name the file.
    fn probe(&mut self, path: &str) -> RecipeResult<ProbeInfo>;
}

/// Probe backed by the system `ffprobe` binary.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    program: String,
    workdir: Option<PathBuf>,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    /// Probe using `program` (a name on PATH or a path to the binary).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            workdir: None,
        }
    }

    /// Resolve relative file paths against `dir` instead of the process working directory.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Directory relative paths are probed from, if overridden.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }
}

impl Probe for FfprobeProbe {
    #[tracing::instrument(skip(self))]
    fn probe(&mut self, path: &str) -> RecipeResult<ProbeInfo> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-v",
            "error",
            "-hide_banner",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let out = cmd
            .output()
            .map_err(|e| RecipeError::probe(path, format!("failed to run {}: {e}", self.program)))?;
        if !out.status.success() {
            return Err(RecipeError::probe(
                path,
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }

        let info = parse_ffprobe_json(&out.stdout).map_err(|e| RecipeError::probe(path, e))?;
        tracing::debug!(
            video = info.video,
            audio = info.audio,
            duration = info.duration,
            "probed"
        );
        Ok(info)
    }
}

/// Interpret `ffprobe -print_format json -show_streams -show_format` output.
///
/// Duration is the longest per-stream duration, falling back to the container duration.
pub fn parse_ffprobe_json(bytes: &[u8]) -> Result<ProbeInfo, String> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut =
        serde_json::from_slice(bytes).map_err(|e| format!("ffprobe json parse failed: {e}"))?;

    let mut info = ProbeInfo::default();
    let mut longest: Option<f64> = None;
    for s in &parsed.streams {
        match s.codec_type.as_deref() {
            Some("video") => info.video += 1,
            Some("audio") => info.audio += 1,
            _ => continue,
        }
        if let Some(d) = s.duration.as_deref().and_then(|d| d.parse::<f64>().ok()) {
            longest = Some(longest.map_or(d, |l| l.max(d)));
        }
    }

    info.duration = longest
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|d| d.parse::<f64>().ok())
        })
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);
    Ok(info)
}

/// Wraps a probe so each distinct path is inspected at most once per run.
#[derive(Debug)]
pub struct CachedProbe<P> {
    inner: P,
    cache: HashMap<String, ProbeInfo>,
}

impl<P: Probe> CachedProbe<P> {
    /// Wrap `inner` with an empty cache.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    /// Unwrap the inner probe.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Probe> Probe for CachedProbe<P> {
    fn probe(&mut self, path: &str) -> RecipeResult<ProbeInfo> {
        if let Some(info) = self.cache.get(path) {
            return Ok(*info);
        }
        let info = self.inner.probe(path)?;
        self.cache.insert(path.to_string(), info);
        Ok(info)
    }
}

/// In-memory probe answering from a fixed table; records how often each path was asked for.
#[derive(Clone, Debug, Default)]
pub struct StaticProbe {
    table: HashMap<String, ProbeInfo>,
    calls: HashMap<String, usize>,
}

impl StaticProbe {
    /// Empty table; every probe fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for `path`.
    pub fn with(mut self, path: &str, video: usize, audio: usize, duration: f64) -> Self {
        self.table.insert(
            path.to_string(),
            ProbeInfo {
                video,
                audio,
                duration,
            },
        );
        self
    }

    /// Number of times `path` was probed.
    pub fn calls(&self, path: &str) -> usize {
        self.calls.get(path).copied().unwrap_or(0)
    }
}

impl Probe for StaticProbe {
    fn probe(&mut self, path: &str) -> RecipeResult<ProbeInfo> {
        *self.calls.entry(path.to_string()).or_default() += 1;
        self.table
            .get(path)
            .copied()
            .ok_or_else(|| RecipeError::probe(path, "no such file"))
    }
}

impl<P: Probe + ?Sized> Probe for &mut P {
    fn probe(&mut self, path: &str) -> RecipeResult<ProbeInfo> {
        (**self).probe(path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/probe/ffprobe.rs"]
mod tests;
