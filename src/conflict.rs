//! Pure placement predicates.
//!
//! Feasibility looks at one exam against one classroom and slot; conflict
//! checks compare two bookings. Nothing here touches the ledger: callers pass
//! whatever placements they want compared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::data::{
    Classroom, ClassroomId, DemandCatalogue, Exam, ExamId, Lecturer, LecturerId, Placement,
    PlacementStatus, StudentId, TimeSlot,
};

pub const SAME_CLASSROOM: u32 = 0;
pub const SAME_LOCATION: u32 = 1;
pub const ADJACENT: u32 = 3;
pub const DIFFERENT_LOCATION: u32 = 10;

static NO_STUDENTS: BTreeSet<StudentId> = BTreeSet::new();

/// Shared resource that makes two overlapping bookings incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Collision {
    #[serde(rename = "collision:classroom")]
    Classroom,
    #[serde(rename = "collision:lecturer")]
    Lecturer,
    #[serde(rename = "collision:student_overlap")]
    StudentOverlap,
}

impl Collision {
    pub fn code(self) -> &'static str {
        Exclusion::from(self).code()
    }
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a candidate (classroom, slot) was ruled out for an exam.
///
/// Variant order is the precedence used when several exclusions explain a
/// failure equally well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Exclusion {
    #[serde(rename = "capacity")]
    Capacity,
    #[serde(rename = "suitability")]
    Suitability,
    #[serde(rename = "slot_duration")]
    SlotDuration,
    #[serde(rename = "lecturer_availability")]
    LecturerAvailability,
    #[serde(rename = "collision:classroom")]
    ClassroomCollision,
    #[serde(rename = "collision:lecturer")]
    LecturerCollision,
    #[serde(rename = "collision:student_overlap")]
    StudentOverlap,
    #[serde(rename = "no_candidates")]
    NoCandidates,
}

impl Exclusion {
    pub fn code(self) -> &'static str {
        match self {
            Exclusion::Capacity => "capacity",
            Exclusion::Suitability => "suitability",
            Exclusion::SlotDuration => "slot_duration",
            Exclusion::LecturerAvailability => "lecturer_availability",
            Exclusion::ClassroomCollision => "collision:classroom",
            Exclusion::LecturerCollision => "collision:lecturer",
            Exclusion::StudentOverlap => "collision:student_overlap",
            Exclusion::NoCandidates => "no_candidates",
        }
    }

    pub fn is_collision(self) -> bool {
        matches!(
            self,
            Exclusion::ClassroomCollision | Exclusion::LecturerCollision | Exclusion::StudentOverlap
        )
    }
}

impl From<Collision> for Exclusion {
    fn from(collision: Collision) -> Self {
        match collision {
            Collision::Classroom => Exclusion::ClassroomCollision,
            Collision::Lecturer => Exclusion::LecturerCollision,
            Collision::StudentOverlap => Exclusion::StudentOverlap,
        }
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Every static check `(exam, classroom, slot)` fails, in precedence order.
pub fn infeasibility(
    exam: &Exam,
    lecturer: &Lecturer,
    classroom: &Classroom,
    slot: &TimeSlot,
) -> Vec<Exclusion> {
    let mut reasons = Vec::new();
    if classroom.capacity < exam.cohort_size {
        reasons.push(Exclusion::Capacity);
    }
    if !classroom.suitable {
        reasons.push(Exclusion::Suitability);
    }
    if slot.duration_minutes() < i64::from(exam.duration_minutes) {
        reasons.push(Exclusion::SlotDuration);
    }
    if !lecturer.is_available_on(slot.weekday()) {
        reasons.push(Exclusion::LecturerAvailability);
    }
    reasons
}

pub fn feasible(exam: &Exam, lecturer: &Lecturer, classroom: &Classroom, slot: &TimeSlot) -> bool {
    classroom.capacity >= exam.cohort_size
        && classroom.suitable
        && slot.duration_minutes() >= i64::from(exam.duration_minutes)
        && lecturer.is_available_on(slot.weekday())
}

/// A placed or proposed exam, flattened to what conflict checks need.
#[derive(Debug, Clone, Copy)]
pub struct Booking<'a> {
    pub exam_id: ExamId,
    pub lecturer_id: LecturerId,
    pub classroom_id: ClassroomId,
    pub slot: TimeSlot,
    pub status: PlacementStatus,
    pub students: &'a BTreeSet<StudentId>,
}

impl<'a> Booking<'a> {
    /// A proposed placement that is not in any ledger yet.
    pub fn candidate(exam: &'a Exam, classroom_id: ClassroomId, slot: TimeSlot) -> Self {
        Self {
            exam_id: exam.id,
            lecturer_id: exam.lecturer_id,
            classroom_id,
            slot,
            status: PlacementStatus::Planned,
            students: &exam.students,
        }
    }

    /// A ledger entry; student overlap is only known for exams in `demand`.
    pub fn placed(placement: &Placement, demand: &'a DemandCatalogue) -> Self {
        let students = demand
            .exam(placement.exam_id)
            .map_or(&NO_STUDENTS, |exam| &exam.students);
        Self {
            exam_id: placement.exam_id,
            lecturer_id: placement.lecturer_id,
            classroom_id: placement.classroom_id,
            slot: placement.slot,
            status: placement.status,
            students,
        }
    }
}

/// Which resources two bookings fight over; empty when they are compatible.
pub fn collisions(a: &Booking<'_>, b: &Booking<'_>) -> Vec<Collision> {
    let mut kinds = Vec::new();
    if !a.status.is_active() || !b.status.is_active() || !a.slot.overlaps(&b.slot) {
        return kinds;
    }
    if a.classroom_id == b.classroom_id {
        kinds.push(Collision::Classroom);
    }
    if a.lecturer_id == b.lecturer_id {
        kinds.push(Collision::Lecturer);
    }
    if !a.students.is_disjoint(b.students) {
        kinds.push(Collision::StudentOverlap);
    }
    kinds
}

pub fn conflicts(a: &Booking<'_>, b: &Booking<'_>) -> bool {
    a.status.is_active()
        && b.status.is_active()
        && a.slot.overlaps(&b.slot)
        && (a.classroom_id == b.classroom_id
            || a.lecturer_id == b.lecturer_id
            || !a.students.is_disjoint(b.students))
}

/// Soft distance between two classrooms; lower is better.
pub fn proximity_score(a: &Classroom, b: &Classroom) -> u32 {
    if a.id == b.id {
        SAME_CLASSROOM
    } else if !a.block().is_empty() && a.block() == b.block() {
        SAME_LOCATION
    } else {
        DIFFERENT_LOCATION
    }
}
