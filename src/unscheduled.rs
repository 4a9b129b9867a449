use crate::data::{DemandCatalogue, Exam, ExamType};
use crate::ledger::Ledger;

/// Exams that still need a placement, in demand order.
///
/// Only exams with `has_exam` set are considered, narrowed to `exam_type`
/// when one is given. Cancelled placements do not count, so cancelling an
/// exam's placement brings it straight back.
pub fn unscheduled<'a>(
    demand: &'a DemandCatalogue,
    ledger: &Ledger,
    exam_type: Option<ExamType>,
) -> Vec<&'a Exam> {
    demand
        .exams()
        .iter()
        .filter(|exam| exam.has_exam)
        .filter(|exam| exam_type.is_none_or(|t| exam.exam_type == t))
        .filter(|exam| !ledger.is_scheduled(exam.id))
        .collect()
}
