//! The Load → Save → Report pipeline.
//!
//! Each stage runs as its own task and may be started at any time; ordering
//! comes only from the session's two gates. Save waits for `loaded`, Report
//! waits for `saved`. Nothing chains stages automatically.

mod collaborators;
mod coordinator;
mod gate;
mod session;

use std::fmt;

pub use collaborators::{
    Collaborators, ConfirmPrompt, FileChoice, ReportRenderer, ReportViewer, SystemViewer,
};
pub use coordinator::{
    LoadOutcome, PipelineCoordinator, Removal, ReportOutcome, SaveOutcome, StageHandle,
};
pub use gate::{Gate, GateState};
pub use session::Session;

/// A unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Save,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => f.write_str("load"),
            Stage::Save => f.write_str("save"),
            Stage::Report => f.write_str("report"),
        }
    }
}

/// Last known position of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Loading,
    Loaded,
    Saving,
    Saved,
    Reporting,
    /// The named stage ended in an error. Only a new load recovers.
    Failed(Stage),
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Idle => f.write_str("idle"),
            PipelineStage::Loading => f.write_str("loading"),
            PipelineStage::Loaded => f.write_str("loaded"),
            PipelineStage::Saving => f.write_str("saving"),
            PipelineStage::Saved => f.write_str("saved"),
            PipelineStage::Reporting => f.write_str("reporting"),
            PipelineStage::Failed(stage) => write!(f, "{stage} failed"),
        }
    }
}
