use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{surface_error, Error, Result, ValidationError};
use crate::filter::{resolve_column, TableFilter};
use crate::models::{Column, EntityKind, Record, ReportKind, StudentRecord, TeacherRecord};
use crate::store::RecordStore;
use crate::xml;

use super::collaborators::{Collaborators, ConfirmPrompt, FileChoice};
use super::gate::Gate;
use super::session::Session;
use super::{PipelineStage, Stage};

/// What a finished load put into the tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub teachers: usize,
    pub students: usize,
}

/// What a finished save wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub path: PathBuf,
    pub teachers: usize,
    pub students: usize,
}

/// Where a finished report was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub kind: ReportKind,
    pub students: usize,
}

/// Result of a removal request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal<R> {
    /// Rows removed, highest original index first.
    Removed(Vec<R>),
    /// The user said no; nothing changed.
    Declined,
}

/// A running stage. Resolve it with [`StageHandle::wait`] from whatever
/// context should react to the stage finishing.
#[derive(Debug)]
pub struct StageHandle<T> {
    stage: Stage,
    task: JoinHandle<Result<T>>,
}

impl<T> StageHandle<T> {
    /// Which stage this handle tracks.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// True once the stage has an outcome. A stage still parked on its gate
    /// reports `false`.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the stage to finish and return its outcome.
    pub async fn wait(self) -> Result<T> {
        let StageHandle { stage, task } = self;
        match task.await {
            Ok(result) => result,
            Err(err) => {
                error!(%stage, error = %err, "stage task stopped before finishing");
                Err(Error::StageAborted { stage })
            }
        }
    }
}

/// Owns the session and sequences Load, Save and Report.
///
/// Table edits (`add_*`, `remove_*`) are expected from a single caller, the
/// front end's dispatch thread. The three stages run on the runtime given to
/// [`PipelineCoordinator::new`] and never block the caller.
///
/// Report reads the student table as it is when the report runs, not as it
/// was saved: edits made between Save and Report appear in the report even
/// though they are not in the saved file.
#[derive(Clone)]
pub struct PipelineCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Handle,
    config: PipelineConfig,
    collaborators: Collaborators,
    session: RwLock<Arc<Session>>,
    load_in_flight: AtomicBool,
    stage: watch::Sender<PipelineStage>,
    teacher_filter: Mutex<TableFilter<TeacherRecord>>,
    student_filter: Mutex<TableFilter<StudentRecord>>,
}

/// Routes generic table operations to the right store and filter.
trait Table: Record {
    fn store(session: &Session) -> &RecordStore<Self>;
    fn filter(inner: &Inner) -> &Mutex<TableFilter<Self>>;
}

impl Table for TeacherRecord {
    fn store(session: &Session) -> &RecordStore<Self> {
        session.teachers()
    }

    fn filter(inner: &Inner) -> &Mutex<TableFilter<Self>> {
        &inner.teacher_filter
    }
}

impl Table for StudentRecord {
    fn store(session: &Session) -> &RecordStore<Self> {
        session.students()
    }

    fn filter(inner: &Inner) -> &Mutex<TableFilter<Self>> {
        &inner.student_filter
    }
}

impl PipelineCoordinator {
    /// Stage tasks are spawned on `runtime`; the caller's own thread is never
    /// used for them. Starts idle with empty tables.
    pub fn new(runtime: Handle, collaborators: Collaborators, config: PipelineConfig) -> Self {
        let (stage, _) = watch::channel(PipelineStage::Idle);
        Self {
            inner: Arc::new(Inner {
                runtime,
                config,
                collaborators,
                session: RwLock::new(Arc::new(Session::initial())),
                load_in_flight: AtomicBool::new(false),
                stage,
                teacher_filter: Mutex::new(TableFilter::default()),
                student_filter: Mutex::new(TableFilter::default()),
            }),
        }
    }

    /// Start loading `choice`. Returns `Ok(None)` when the chooser was
    /// cancelled and [`Error::LoadInProgress`] while another load runs.
    ///
    /// A load after a finished or failed one starts a new session; stages still
    /// waiting on the old session's gates resolve with
    /// [`Error::StageCancelled`].
    pub fn start_load(
        &self,
        choice: impl Into<FileChoice>,
    ) -> Result<Option<StageHandle<LoadOutcome>>> {
        let FileChoice::Chosen(path) = choice.into() else {
            info!("load cancelled by the user");
            return Ok(None);
        };

        if self
            .inner
            .load_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(path = %path.display(), "load rejected: another load is running");
            return Err(Error::LoadInProgress);
        }
        let guard = LoadGuard(self.inner.clone());

        let session = self.inner.begin_cycle();
        info!(path = %path.display(), generation = session.generation(), "load started");

        let inner = self.inner.clone();
        let task = self.inner.runtime.spawn(async move {
            let _guard = guard;
            inner.run_load(&session, path).await
        });
        Ok(Some(StageHandle {
            stage: Stage::Load,
            task,
        }))
    }

    /// Start saving to `choice` once the current session has loaded.
    pub fn start_save(&self, choice: impl Into<FileChoice>) -> Option<StageHandle<SaveOutcome>> {
        let FileChoice::Chosen(path) = choice.into() else {
            info!("save cancelled by the user");
            return None;
        };

        let session = self.inner.current();
        info!(path = %path.display(), generation = session.generation(), "save queued");

        let inner = self.inner.clone();
        let task = self
            .inner
            .runtime
            .spawn(async move { inner.run_save(&session, path).await });
        Some(StageHandle {
            stage: Stage::Save,
            task,
        })
    }

    /// Start a report of the student table once the current session has saved.
    pub fn start_report(
        &self,
        kind: ReportKind,
        choice: impl Into<FileChoice>,
    ) -> Option<StageHandle<ReportOutcome>> {
        let FileChoice::Chosen(path) = choice.into() else {
            info!("report cancelled by the user");
            return None;
        };

        let session = self.inner.current();
        info!(path = %path.display(), %kind, generation = session.generation(), "report queued");

        let inner = self.inner.clone();
        let task = self
            .inner
            .runtime
            .spawn(async move { inner.run_report(&session, kind, path).await });
        Some(StageHandle {
            stage: Stage::Report,
            task,
        })
    }

    /// Append a teacher exactly as entered. Any empty field rejects the whole
    /// record with [`ValidationError::EmptyField`].
    pub fn add_teacher(&self, record: TeacherRecord) -> Result<()> {
        self.add(record)
    }

    /// Append a student exactly as entered, with the same rule as
    /// [`PipelineCoordinator::add_teacher`].
    pub fn add_student(&self, record: StudentRecord) -> Result<()> {
        self.add(record)
    }

    /// Remove teachers by storage index after the user confirms.
    pub fn remove_teachers(
        &self,
        indices: &BTreeSet<usize>,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<Removal<TeacherRecord>> {
        self.remove(indices, prompt)
    }

    /// Remove students by storage index after the user confirms.
    pub fn remove_students(
        &self,
        indices: &BTreeSet<usize>,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<Removal<StudentRecord>> {
        self.remove(indices, prompt)
    }

    /// Filter one table by a named criterion. Returns the storage indices of
    /// the visible rows.
    pub fn search(&self, entity: EntityKind, criterion: &str, pattern: &str) -> Result<Vec<usize>> {
        match entity {
            EntityKind::Teachers => self.search_in::<TeacherRecord>(criterion, pattern),
            EntityKind::Students => self.search_in::<StudentRecord>(criterion, pattern),
        }
    }

    /// Clear the table's filter. Returns every storage index.
    pub fn reset_filter(&self, entity: EntityKind) -> Vec<usize> {
        info!(%entity, "filter reset");
        match entity {
            EntityKind::Teachers => self.reset_in::<TeacherRecord>(),
            EntityKind::Students => self.reset_in::<StudentRecord>(),
        }
    }

    /// Storage indices currently visible under the table's filter.
    pub fn visible(&self, entity: EntityKind) -> Vec<usize> {
        match entity {
            EntityKind::Teachers => self.visible_in::<TeacherRecord>(),
            EntityKind::Students => self.visible_in::<StudentRecord>(),
        }
    }

    /// Copy of the teacher table in storage order.
    pub fn teachers(&self) -> Vec<TeacherRecord> {
        self.inner.current().teachers().snapshot()
    }

    /// Copy of the student table in storage order.
    pub fn students(&self) -> Vec<StudentRecord> {
        self.inner.current().students().snapshot()
    }

    /// Last known pipeline position.
    pub fn stage(&self) -> PipelineStage {
        *self.inner.stage.borrow()
    }

    /// Follow stage changes, e.g. to enable or disable controls.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.inner.stage.subscribe()
    }

    /// The current session. Holding it does not keep it current: the next
    /// load after a finished one replaces it.
    pub fn session(&self) -> Arc<Session> {
        self.inner.current()
    }

    fn add<R: Table>(&self, record: R) -> Result<()> {
        if let Err(err) = record.validate() {
            warn!(entity = %R::ENTITY, error = %err, "record rejected");
            return Err(err.into());
        }

        let session = self.inner.current();
        info!(entity = %R::ENTITY, name = record.display_name(), "record added");
        R::store(&session).add(record);
        Ok(())
    }

    fn remove<R: Table>(
        &self,
        indices: &BTreeSet<usize>,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<Removal<R>> {
        if indices.is_empty() {
            warn!(entity = %R::ENTITY, "removal requested with nothing selected");
            return Err(ValidationError::NothingSelected { entity: R::ENTITY }.into());
        }

        let session = self.inner.current();
        let store = R::store(&session);
        let len = store.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            warn!(entity = %R::ENTITY, index, len, "removal requested for a stale row");
            return Err(Error::IndexOutOfRange { index, len });
        }

        let names: Vec<String> = store
            .pick(indices)
            .iter()
            .map(|record| record.display_name().to_string())
            .collect();
        if !prompt.confirm(&names) {
            info!(entity = %R::ENTITY, rows = names.len(), "removal declined by the user");
            return Ok(Removal::Declined);
        }

        let removed = store.remove_many(indices)?;
        for record in &removed {
            info!(entity = %R::ENTITY, name = record.display_name(), "record removed");
        }
        Ok(Removal::Removed(removed))
    }

    fn search_in<R: Table>(&self, criterion: &str, pattern: &str) -> Result<Vec<usize>> {
        let pattern = pattern.trim();
        let column = resolve_column::<R>(criterion).inspect_err(|err| {
            warn!(entity = %R::ENTITY, error = %err, "search rejected");
        })?;

        let rows = R::store(&self.inner.current()).snapshot();
        let visible = lock(R::filter(&self.inner))
            .search(&rows, column, pattern)
            .inspect_err(|err| {
                warn!(entity = %R::ENTITY, error = %err, "search rejected");
            })?;

        info!(
            entity = %R::ENTITY,
            criterion = column.label(),
            pattern,
            matches = visible.len(),
            "search applied"
        );
        Ok(visible)
    }

    fn reset_in<R: Table>(&self) -> Vec<usize> {
        let rows = R::store(&self.inner.current()).snapshot();
        lock(R::filter(&self.inner)).reset(&rows)
    }

    fn visible_in<R: Table>(&self) -> Vec<usize> {
        let rows = R::store(&self.inner.current()).snapshot();
        lock(R::filter(&self.inner)).visible(&rows)
    }
}

impl Inner {
    fn current(&self) -> Arc<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make the session ready for a load. The first load of a session adopts
    /// it, so saves and reports queued before that load keep their gates.
    fn begin_cycle(&self) -> Arc<Session> {
        let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if current.load_attempted() {
            let next = Arc::new(current.successor());
            current.retire();
            info!(
                retired = current.generation(),
                generation = next.generation(),
                "session reset"
            );
            *current = next;
        }
        self.stage.send_replace(PipelineStage::Loading);
        current.clone()
    }

    /// Record a stage change, unless `session` has already been replaced.
    fn transition(&self, session: &Session, next: PipelineStage) {
        let current = self.session.read().unwrap_or_else(PoisonError::into_inner);
        if current.generation() != session.generation() {
            debug!(
                generation = session.generation(),
                stage = %next,
                "ignoring stage change from a retired session"
            );
            return;
        }
        let previous = self.stage.send_replace(next);
        debug!(from = %previous, to = %next, "pipeline stage changed");
    }

    /// Wait for `gate` on behalf of `waiter`, honouring the configured timeout.
    async fn pass(&self, gate: &Gate, waiter: Stage) -> Result<()> {
        debug!(stage = %waiter, gate = %gate.guards(), "waiting for predecessor");
        match self.config.gate_timeout {
            None => gate.await_open(waiter).await,
            Some(limit) => match tokio::time::timeout(limit, gate.await_open(waiter)).await {
                Ok(passed) => passed,
                Err(_) => Err(Error::GateTimeout {
                    stage: waiter,
                    waited: limit,
                }),
            },
        }
    }

    async fn run_load(&self, session: &Session, path: PathBuf) -> Result<LoadOutcome> {
        let decoded = match read_document(&path).await {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(
                    stage = %Stage::Load,
                    path = %path.display(),
                    teachers = session.teachers().len(),
                    students = session.students().len(),
                    error = %err,
                    "load failed; tables left unchanged"
                );
                self.transition(session, PipelineStage::Failed(Stage::Load));
                session.loaded().fail();
                return Err(err);
            }
        };

        let outcome = LoadOutcome {
            path,
            teachers: decoded.teachers.len(),
            students: decoded.students.len(),
        };
        session.teachers().replace_all(decoded.teachers);
        session.students().replace_all(decoded.students);
        self.transition(session, PipelineStage::Loaded);
        session.loaded().open();

        info!(
            path = %outcome.path.display(),
            teachers = outcome.teachers,
            students = outcome.students,
            "load finished"
        );
        Ok(outcome)
    }

    async fn run_save(&self, session: &Session, path: PathBuf) -> Result<SaveOutcome> {
        let result = match self.pass(session.loaded(), Stage::Save).await {
            Ok(()) => self.write_session(session, &path).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(outcome) => {
                self.transition(session, PipelineStage::Saved);
                session.saved().open();
                info!(
                    path = %outcome.path.display(),
                    teachers = outcome.teachers,
                    students = outcome.students,
                    "save finished"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    stage = %Stage::Save,
                    path = %path.display(),
                    teachers = session.teachers().len(),
                    students = session.students().len(),
                    error = %err,
                    "save failed"
                );
                if !matches!(err, Error::StageCancelled { .. }) {
                    self.transition(session, PipelineStage::Failed(Stage::Save));
                    session.saved().fail();
                }
                Err(err)
            }
        }
    }

    async fn write_session(&self, session: &Session, path: &Path) -> Result<SaveOutcome> {
        self.transition(session, PipelineStage::Saving);
        let teachers = session.teachers().snapshot();
        let students = session.students().snapshot();
        info!(
            path = %path.display(),
            teachers = teachers.len(),
            students = students.len(),
            "save started"
        );

        let bytes = xml::encode(&teachers, &students)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| Error::WriteFailed {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(SaveOutcome {
            path: path.to_path_buf(),
            teachers: teachers.len(),
            students: students.len(),
        })
    }

    async fn run_report(
        &self,
        session: &Session,
        kind: ReportKind,
        chosen: PathBuf,
    ) -> Result<ReportOutcome> {
        if let Err(err) = self.pass(session.saved(), Stage::Report).await {
            error!(
                stage = %Stage::Report,
                path = %chosen.display(),
                error = %err,
                "report could not start"
            );
            return Err(err);
        }

        self.transition(session, PipelineStage::Reporting);
        let result = self.render_report(session, kind, &chosen).await;
        self.transition(session, PipelineStage::Idle);

        match &result {
            Ok(outcome) => info!(
                path = %outcome.path.display(),
                %kind,
                students = outcome.students,
                "report finished"
            ),
            Err(err) => error!(
                stage = %Stage::Report,
                path = %chosen.display(),
                students = session.students().len(),
                error = %err,
                "report failed"
            ),
        }
        result
    }

    async fn render_report(
        &self,
        session: &Session,
        kind: ReportKind,
        chosen: &Path,
    ) -> Result<ReportOutcome> {
        // Read live: edits made after the save are part of the report.
        let students = session.students().snapshot();
        let document = xml::encode_report_subset(&students)?;
        let output = self.config.report_path(chosen, kind);

        let renderer = self.collaborators.renderer.clone();
        let target = output.clone();
        let rendered =
            tokio::task::spawn_blocking(move || renderer.render(&document, kind, &target)).await;
        match rendered {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(Error::ReportRendering {
                    path: output,
                    message: surface_error(&err),
                })
            }
            Err(err) => {
                error!(error = %err, "report renderer panicked");
                return Err(Error::StageAborted {
                    stage: Stage::Report,
                });
            }
        }

        if self.config.open_report_after_render {
            let viewer = self.collaborators.viewer.clone();
            let report = output.clone();
            match tokio::task::spawn_blocking(move || viewer.show(&report)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(path = %output.display(), error = %surface_error(&err), "could not open report")
                }
                Err(err) => warn!(path = %output.display(), error = %err, "report viewer panicked"),
            }
        }

        Ok(ReportOutcome {
            path: output,
            kind,
            students: students.len(),
        })
    }
}

/// Clears the in-flight flag when the load task ends, however it ends.
struct LoadGuard(Arc<Inner>);

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.0.load_in_flight.store(false, Ordering::Release);
    }
}

async fn read_document(path: &Path) -> Result<xml::Decoded> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| Error::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    xml::decode(&bytes)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
