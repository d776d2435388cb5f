//! Domain records held in the two tables and the small enums that name their
//! columns. The records stay plain data holders; storage, filtering and the
//! XML codec all work through the [`Record`] trait so one generic code path
//! serves both tables.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Behaviour shared by both record kinds.
pub trait Record: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Column selector for this record kind.
    type Column: Column;

    /// Which table the record belongs to.
    const ENTITY: EntityKind;

    /// Borrow the value stored in one column.
    fn field(&self, column: Self::Column) -> &str;

    /// Name shown in confirmation prompts and log lines.
    fn display_name(&self) -> &str {
        self.field(Self::Column::FULL_NAME)
    }

    /// Reject a record with an empty field. Whitespace counts as content and
    /// is stored as typed. Only entry goes through this; decoded rows are
    /// stored as found.
    fn validate(&self) -> Result<(), ValidationError> {
        for column in Self::Column::ALL {
            if self.field(*column).is_empty() {
                return Err(ValidationError::EmptyField {
                    entity: Self::ENTITY,
                    field: column.label(),
                });
            }
        }
        Ok(())
    }
}

/// A searchable column of a record kind.
pub trait Column: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Every column, in table order.
    const ALL: &'static [Self];

    /// The column holding the person's full name.
    const FULL_NAME: Self;

    /// Human-readable criterion name offered by the search panel.
    fn label(self) -> &'static str;

    /// XML attribute that stores this column.
    fn attribute(self) -> &'static str;

    /// Resolve a criterion name (label or attribute name, any case).
    fn parse(criterion: &str) -> Option<Self> {
        let wanted = criterion.trim();
        Self::ALL.iter().copied().find(|column| {
            column.label().eq_ignore_ascii_case(wanted)
                || column.attribute().eq_ignore_ascii_case(wanted)
        })
    }
}

/// The two tables managed by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Teachers,
    Students,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Teachers => f.write_str("teachers"),
            EntityKind::Students => f.write_str("students"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// One row of the teacher table.
pub struct TeacherRecord {
    /// Full name as typed by the user.
    pub full_name: String,
    /// Subject taught.
    pub subject: String,
    /// Free-form list of classes, e.g. `5A, 6B`.
    pub classes: String,
}

impl TeacherRecord {
    pub fn new(
        full_name: impl Into<String>,
        subject: impl Into<String>,
        classes: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            subject: subject.into(),
            classes: classes.into(),
        }
    }
}

impl Record for TeacherRecord {
    type Column = TeacherColumn;
    const ENTITY: EntityKind = EntityKind::Teachers;

    fn field(&self, column: TeacherColumn) -> &str {
        match column {
            TeacherColumn::FullName => &self.full_name,
            TeacherColumn::Subject => &self.subject,
            TeacherColumn::Classes => &self.classes,
        }
    }
}

impl fmt::Display for TeacherRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.subject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// One row of the student table.
pub struct StudentRecord {
    /// Full name as typed by the user.
    pub full_name: String,
    /// Class the student attends. Stored in the `class` attribute.
    pub class_name: String,
    /// Performance note or grade; kept as text.
    pub performance: String,
}

impl StudentRecord {
    pub fn new(
        full_name: impl Into<String>,
        class_name: impl Into<String>,
        performance: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            class_name: class_name.into(),
            performance: performance.into(),
        }
    }
}

impl Record for StudentRecord {
    type Column = StudentColumn;
    const ENTITY: EntityKind = EntityKind::Students;

    fn field(&self, column: StudentColumn) -> &str {
        match column {
            StudentColumn::FullName => &self.full_name,
            StudentColumn::ClassName => &self.class_name,
            StudentColumn::Performance => &self.performance,
        }
    }
}

impl fmt::Display for StudentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.class_name)
    }
}

/// Searchable teacher columns. The order matches the table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeacherColumn {
    FullName,
    Subject,
    Classes,
}

impl Column for TeacherColumn {
    const ALL: &'static [Self] = &[Self::FullName, Self::Subject, Self::Classes];
    const FULL_NAME: Self = Self::FullName;

    fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::Subject => "Subject",
            Self::Classes => "Classes",
        }
    }

    fn attribute(self) -> &'static str {
        match self {
            Self::FullName => "name",
            Self::Subject => "subject",
            Self::Classes => "classes",
        }
    }
}

/// Searchable student columns. The order matches the table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudentColumn {
    FullName,
    ClassName,
    Performance,
}

impl Column for StudentColumn {
    const ALL: &'static [Self] = &[Self::FullName, Self::ClassName, Self::Performance];
    const FULL_NAME: Self = Self::FullName;

    fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::ClassName => "Class",
            Self::Performance => "Performance",
        }
    }

    fn attribute(self) -> &'static str {
        match self {
            Self::FullName => "name",
            Self::ClassName => "class",
            Self::Performance => "performance",
        }
    }
}

/// Output format requested from the report renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Pdf,
    Html,
}

impl ReportKind {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ReportKind::Pdf => "pdf",
            ReportKind::Html => "html",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportKind::Pdf),
            "html" => Ok(ReportKind::Html),
            other => Err(format!("unsupported report kind `{other}`")),
        }
    }
}
