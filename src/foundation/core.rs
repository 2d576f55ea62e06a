use std::fmt;

/// Identity of one node in an [`crate::EditGraph`] arena.
///
/// Two references to the same shared sub-tree carry the same `NodeId`; caches are keyed by it,
/// never by structural equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stream domain of a label or stream count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum StreamKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
}

impl StreamKind {
    /// Single-letter stream specifier used by the processing tool (`v` / `a`).
    pub fn specifier(self) -> char {
        match self {
            Self::Video => 'v',
            Self::Audio => 'a',
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// Resolved stream metadata of a node: counts per domain plus duration in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Streams {
    /// Number of video streams.
    pub video: usize,
    /// Number of audio streams.
    pub audio: usize,
    /// Duration in seconds (never negative).
    pub duration: f64,
}

impl Streams {
    /// Build a metadata triple, clamping `duration` to be non-negative.
    pub fn new(video: usize, audio: usize, duration: f64) -> Self {
        Self {
            video,
            audio,
            duration: non_negative(duration),
        }
    }

    /// Stream count for one domain.
    pub fn count(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Video => self.video,
            StreamKind::Audio => self.audio,
        }
    }

    /// Total number of streams (video + audio).
    pub fn total(&self) -> usize {
        self.video + self.audio
    }
}

/// Explicit user overrides for a node's metadata (`v`, `a`, `t` in a recipe).
///
/// Each field replaces only its counterpart; unset fields keep propagating from inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct StreamOverrides {
    /// Forced video stream count.
    pub video: Option<usize>,
    /// Forced audio stream count.
    pub audio: Option<usize>,
    /// Forced duration in seconds.
    pub duration: Option<f64>,
}

impl StreamOverrides {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none() && self.duration.is_none()
    }

    /// Apply the set fields on top of computed metadata.
    pub fn apply(&self, computed: Streams) -> Streams {
        Streams::new(
            self.video.unwrap_or(computed.video),
            self.audio.unwrap_or(computed.audio),
            self.duration.unwrap_or(computed.duration),
        )
    }
}

pub(crate) fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Format a number the way the processing tool expects it in filter options.
pub(crate) fn fmt_num(v: f64) -> String {
    format!("{v}")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
