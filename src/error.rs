use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::conflict::{Collision, Exclusion};
use crate::data::{ClassroomId, ExamId, ExamType, LecturerId, PlacementId, TimeSlot};

/// Malformed resources or configuration. Aborts a run before any placement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("classroom {classroom} has zero capacity")]
    ZeroCapacity { classroom: ClassroomId },

    #[error("classroom id {0} appears more than once")]
    DuplicateClassroom(ClassroomId),

    #[error("lecturer id {0} appears more than once")]
    DuplicateLecturer(LecturerId),

    #[error("adjacency pair references unknown classroom {0}")]
    UnknownAdjacentClassroom(ClassroomId),

    #[error("time slot {0} does not end after it starts")]
    EmptySlot(TimeSlot),

    #[error("time slots {0} and {1} overlap")]
    OverlappingSlots(TimeSlot, TimeSlot),

    #[error("exam period ends on {end}, before it starts on {start}")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },

    #[error("ledger placement {next} follows placement {previous}; ids must be unique and increasing")]
    UnorderedPlacements {
        previous: PlacementId,
        next: PlacementId,
    },
}

/// A malformed exam. The exam is rejected and reported; the run goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ValidationError {
    #[error("exam {exam} has a non-positive duration")]
    NonPositiveDuration { exam: ExamId },

    #[error("exam {exam} has a non-positive cohort size")]
    NonPositiveCohort { exam: ExamId },

    #[error("exam {exam} declares a cohort of {cohort} but enrols {enrolled} students")]
    CohortMismatch {
        exam: ExamId,
        cohort: u32,
        enrolled: usize,
    },

    #[error("exam {exam} references unknown lecturer {lecturer}")]
    UnknownLecturer { exam: ExamId, lecturer: LecturerId },

    #[error("exam id {exam} appears more than once")]
    DuplicateExam { exam: ExamId },

    #[error("course {course} already has a {exam_type} exam, exam {exam} repeats it")]
    DuplicateCourseExam {
        exam: ExamId,
        course: String,
        exam_type: ExamType,
    },
}

impl ValidationError {
    pub fn exam_id(&self) -> ExamId {
        match self {
            ValidationError::NonPositiveDuration { exam }
            | ValidationError::NonPositiveCohort { exam }
            | ValidationError::CohortMismatch { exam, .. }
            | ValidationError::UnknownLecturer { exam, .. }
            | ValidationError::DuplicateExam { exam }
            | ValidationError::DuplicateCourseExam { exam, .. } => *exam,
        }
    }
}

/// Failure of a manual ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown exam {0}")]
    UnknownExam(ExamId),

    #[error("unknown classroom {0}")]
    UnknownClassroom(ClassroomId),

    #[error("unknown lecturer {0}")]
    UnknownLecturer(LecturerId),

    #[error("unknown placement {0}")]
    UnknownPlacement(PlacementId),

    #[error("placement is infeasible: {}", .reasons.iter().join(", "))]
    Infeasible { reasons: Vec<Exclusion> },

    #[error("exam {exam} already has active placement {placement}")]
    AlreadyScheduled { exam: ExamId, placement: PlacementId },

    #[error("placement collides with placement {placement}: {}", .kinds.iter().join(", "))]
    Conflict {
        placement: PlacementId,
        kinds: Vec<Collision>,
    },

    #[error("placement {0} is cancelled")]
    Cancelled(PlacementId),
}

/// Errors surfaced by the HTTP shell.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("scheduling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
