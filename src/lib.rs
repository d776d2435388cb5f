//! Core of the school records manager: teacher and student tables, column
//! search, the XML record file, and the Load → Save → Report pipeline.
//!
//! There is no user interface here. A front end owns a
//! [`PipelineCoordinator`], forwards table edits to it, and starts stages with
//! whatever its file choosers and prompts return.
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod xml;

pub use config::PipelineConfig;
pub use error::{Error, Result, ValidationError};

/// The record types the tables hold.
pub use models::{
    Column, EntityKind, Record, ReportKind, StudentColumn, StudentRecord, TeacherColumn,
    TeacherRecord,
};

/// Stage sequencing and the seams a front end plugs into.
pub use pipeline::{
    Collaborators, ConfirmPrompt, FileChoice, LoadOutcome, PipelineCoordinator, PipelineStage,
    Removal, ReportOutcome, ReportRenderer, ReportViewer, SaveOutcome, Stage, StageHandle,
};
