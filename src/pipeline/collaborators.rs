//! Seams to the front end: file choices, confirmation prompts and report
//! rendering all live outside the core.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::ReportKind;

/// Result of a file chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChoice {
    Chosen(PathBuf),
    /// The user dismissed the chooser; stages treat this as a no-op.
    Cancelled,
}

impl From<PathBuf> for FileChoice {
    fn from(path: PathBuf) -> Self {
        FileChoice::Chosen(path)
    }
}

impl From<&Path> for FileChoice {
    fn from(path: &Path) -> Self {
        FileChoice::Chosen(path.to_path_buf())
    }
}

impl From<Option<PathBuf>> for FileChoice {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(FileChoice::Cancelled, FileChoice::Chosen)
    }
}

/// Asks the user to confirm a destructive action on the named rows.
pub trait ConfirmPrompt {
    fn confirm(&self, names: &[String]) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&[String]) -> bool,
{
    fn confirm(&self, names: &[String]) -> bool {
        self(names)
    }
}

/// Turns the student document into a finished report at `output`.
///
/// Called on a blocking thread, so implementations may do slow I/O.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, document: &[u8], kind: ReportKind, output: &Path) -> Result<()>;
}

impl<F> ReportRenderer for F
where
    F: Fn(&[u8], ReportKind, &Path) -> Result<()> + Send + Sync,
{
    fn render(&self, document: &[u8], kind: ReportKind, output: &Path) -> Result<()> {
        self(document, kind, output)
    }
}

/// Shows a finished report to the user.
pub trait ReportViewer: Send + Sync {
    fn show(&self, report: &Path) -> Result<()>;
}

/// Hands the report to whatever application the desktop associates with it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemViewer;

impl ReportViewer for SystemViewer {
    fn show(&self, report: &Path) -> Result<()> {
        open::that(report).with_context(|| format!("failed to open {}", report.display()))
    }
}

/// Everything the coordinator calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn ReportRenderer>,
    pub viewer: Arc<dyn ReportViewer>,
}

impl Collaborators {
    pub fn new(renderer: impl ReportRenderer + 'static) -> Self {
        Self {
            renderer: Arc::new(renderer),
            viewer: Arc::new(SystemViewer),
        }
    }

    pub fn with_viewer(mut self, viewer: impl ReportViewer + 'static) -> Self {
        self.viewer = Arc::new(viewer);
        self
    }
}
