use std::sync::Arc;

use crate::models::{StudentRecord, TeacherRecord};
use crate::store::RecordStore;

use super::gate::Gate;
use super::Stage;

/// The live tables plus the two gates of one load cycle.
///
/// Exactly one session is current at a time. A load that follows a finished
/// (or failed) load replaces the session: the old gates are abandoned and the
/// new ones start closed. The record stores are handed over to the successor
/// and only swapped by a successful decode, so a failed reload keeps the rows
/// the user was looking at.
#[derive(Debug)]
pub struct Session {
    generation: u64,
    teachers: Arc<RecordStore<TeacherRecord>>,
    students: Arc<RecordStore<StudentRecord>>,
    loaded: Gate,
    saved: Gate,
}

impl Session {
    pub(crate) fn initial() -> Self {
        Self::with_stores(0, Arc::default(), Arc::default())
    }

    pub(crate) fn successor(&self) -> Self {
        Self::with_stores(
            self.generation + 1,
            self.teachers.clone(),
            self.students.clone(),
        )
    }

    fn with_stores(
        generation: u64,
        teachers: Arc<RecordStore<TeacherRecord>>,
        students: Arc<RecordStore<StudentRecord>>,
    ) -> Self {
        Self {
            generation,
            teachers,
            students,
            loaded: Gate::new(Stage::Load),
            saved: Gate::new(Stage::Save),
        }
    }

    /// Counts loads that replaced the session, starting from zero.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn teachers(&self) -> &RecordStore<TeacherRecord> {
        &self.teachers
    }

    pub fn students(&self) -> &RecordStore<StudentRecord> {
        &self.students
    }

    /// Opens once the load of this session has populated the stores.
    pub fn loaded(&self) -> &Gate {
        &self.loaded
    }

    /// Opens once a save in this session has written its file.
    pub fn saved(&self) -> &Gate {
        &self.saved
    }

    /// Whether a load has already finished, either way, in this session.
    pub(crate) fn load_attempted(&self) -> bool {
        self.loaded.state() != super::GateState::Closed
    }

    /// Release everyone still waiting on this session's gates.
    pub(crate) fn retire(&self) {
        self.loaded.abandon();
        self.saved.abandon();
    }
}
