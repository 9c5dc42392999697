use std::fmt;

/// Where a source's pass currently is.
///
/// A batch moves through these in order and returns to `Idle`. The watermark
/// is only written in `Advancing`, after the whole batch has been enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting,
    Enriching,
    Merging,
    Transforming,
    Enqueuing,
    Advancing,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Extracting => "extracting",
            PipelineState::Enriching => "enriching",
            PipelineState::Merging => "merging",
            PipelineState::Transforming => "transforming",
            PipelineState::Enqueuing => "enqueuing",
            PipelineState::Advancing => "advancing",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
