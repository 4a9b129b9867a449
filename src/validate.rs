//! Input validation for scheduling runs.
//!
//! Resource and slot problems are fatal: a run cannot reason about a
//! classroom without seats, slots that overlap each other or a ledger whose
//! placement ids repeat. Exam problems
//! only reject the exam concerned; the rest of the demand is still scheduled.

use std::collections::HashSet;

use crate::config::SolverConfig;
use crate::data::{Exam, ExamType, ResourceCatalogue, TimeSlot};
use crate::error::{InputError, ValidationError};
use crate::ledger::Ledger;

/// Checks classrooms, lecturers and adjacency pairs.
pub fn validate_resources(resources: &ResourceCatalogue) -> Result<(), InputError> {
    let mut classroom_ids = HashSet::new();
    for classroom in resources.classrooms() {
        if !classroom_ids.insert(classroom.id) {
            return Err(InputError::DuplicateClassroom(classroom.id));
        }
        if classroom.capacity == 0 {
            return Err(InputError::ZeroCapacity {
                classroom: classroom.id,
            });
        }
    }

    let mut lecturer_ids = HashSet::new();
    for lecturer in resources.lecturers() {
        if !lecturer_ids.insert(lecturer.id) {
            return Err(InputError::DuplicateLecturer(lecturer.id));
        }
    }

    for &(a, b) in resources.adjacent_pairs() {
        for id in [a, b] {
            if !classroom_ids.contains(&id) {
                return Err(InputError::UnknownAdjacentClassroom(id));
            }
        }
    }
    Ok(())
}

/// Resolves the run's candidate slots, rejecting empty or overlapping ones.
pub fn validate_slots(config: &SolverConfig) -> Result<Vec<TimeSlot>, InputError> {
    if let Some(period) = &config.period {
        if period.end_date < period.start_date {
            return Err(InputError::InvertedPeriod {
                start: period.start_date,
                end: period.end_date,
            });
        }
    }

    let slots = config.candidate_slots();
    if let Some(slot) = slots.iter().find(|s| s.end <= s.start) {
        return Err(InputError::EmptySlot(*slot));
    }
    // sorted by start, so any overlap shows up between neighbours
    if let Some(pair) = slots.windows(2).find(|w| w[0].overlaps(&w[1])) {
        return Err(InputError::OverlappingSlots(pair[0], pair[1]));
    }
    Ok(slots)
}

/// Checks that a caller-supplied ledger keeps its placements in strictly
/// increasing id order, which id allocation and undo rely on.
pub fn validate_ledger(ledger: &Ledger) -> Result<(), InputError> {
    if let Some(pair) = ledger.placements().windows(2).find(|w| w[0].id >= w[1].id) {
        return Err(InputError::UnorderedPlacements {
            previous: pair[0].id,
            next: pair[1].id,
        });
    }
    Ok(())
}

/// Splits exams into those fit for the solver and the reasons others are not.
///
/// The first exam carrying an id, or a (course, exam type) pair, wins; later
/// repeats are rejected.
pub fn validate_demand<'a>(
    exams: impl IntoIterator<Item = &'a Exam>,
    resources: &ResourceCatalogue,
) -> (Vec<&'a Exam>, Vec<ValidationError>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_courses: HashSet<(&str, ExamType)> = HashSet::new();

    for exam in exams {
        let before = errors.len();

        if !seen_ids.insert(exam.id) {
            errors.push(ValidationError::DuplicateExam { exam: exam.id });
        } else if !seen_courses.insert((exam.course_code.as_str(), exam.exam_type)) {
            errors.push(ValidationError::DuplicateCourseExam {
                exam: exam.id,
                course: exam.course_code.clone(),
                exam_type: exam.exam_type,
            });
        }
        if exam.duration_minutes == 0 {
            errors.push(ValidationError::NonPositiveDuration { exam: exam.id });
        }
        if exam.cohort_size == 0 {
            errors.push(ValidationError::NonPositiveCohort { exam: exam.id });
        } else if !exam.students.is_empty() && exam.students.len() != exam.cohort_size as usize {
            errors.push(ValidationError::CohortMismatch {
                exam: exam.id,
                cohort: exam.cohort_size,
                enrolled: exam.students.len(),
            });
        }
        if resources.lecturer(exam.lecturer_id).is_none() {
            errors.push(ValidationError::UnknownLecturer {
                exam: exam.id,
                lecturer: exam.lecturer_id,
            });
        }

        if errors.len() == before {
            valid.push(exam);
        }
    }
    (valid, errors)
}
