use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;

use crate::models::ReportKind;

/// Knobs for the pipeline. The defaults reproduce the desktop behaviour:
/// reports go to the home directory and gate waits never time out.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base directory for report paths given relative.
    pub report_dir: PathBuf,
    /// Upper bound on how long Save and Report wait for their predecessor.
    /// `None` waits as long as it takes.
    pub gate_timeout: Option<Duration>,
    /// Hand each finished report to the system viewer.
    pub open_report_after_render: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            gate_timeout: None,
            open_report_after_render: false,
        }
    }
}

impl PipelineConfig {
    /// Final location of a report: relative paths land in `report_dir` and the
    /// kind's extension is appended unless the name already ends with it.
    pub fn report_path(&self, chosen: &Path, kind: ReportKind) -> PathBuf {
        let path = if chosen.is_absolute() {
            chosen.to_path_buf()
        } else {
            self.report_dir.join(chosen)
        };

        let suffix = format!(".{}", kind.extension());
        if path.to_string_lossy().to_lowercase().ends_with(&suffix) {
            return path;
        }

        let mut named = path.into_os_string();
        named.push(suffix);
        PathBuf::from(named)
    }
}

/// The user's home directory, or the working directory when it is unknown.
fn default_report_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig {
            report_dir: PathBuf::from("/home/teacher"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn relative_paths_resolve_against_report_dir() {
        assert_eq!(
            config().report_path(Path::new("grades"), ReportKind::Pdf),
            PathBuf::from("/home/teacher/grades.pdf")
        );
    }

    #[test]
    fn existing_extension_is_kept_in_any_case() {
        assert_eq!(
            config().report_path(Path::new("/tmp/Grades.HTML"), ReportKind::Html),
            PathBuf::from("/tmp/Grades.HTML")
        );
    }

    #[test]
    fn other_extensions_get_the_kind_appended() {
        assert_eq!(
            config().report_path(Path::new("/tmp/grades.txt"), ReportKind::Pdf),
            PathBuf::from("/tmp/grades.txt.pdf")
        );
    }

    #[test]
    fn defaults_never_time_out() {
        let config = PipelineConfig::default();
        assert!(config.gate_timeout.is_none());
        assert!(!config.open_report_after_render);
    }
}
