//! Read-only reports over a ledger: soft quality, statistics and manual
//! placement checks.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::calendar::is_weekend;
use crate::conflict::{self, Booking, Exclusion};
use crate::data::{Catalogues, ClassroomId, Placement, PlacementStatus};
use crate::error::LedgerError;
use crate::ledger::{Ledger, PlacementRequest};

/// Occupancy above which a manual check warns, in percent.
pub const HIGH_OCCUPANCY_PERCENT: u32 = 80;
/// Spare minutes in a slot above which a manual check warns.
pub const LONG_SLOT_SPARE_MINUTES: i64 = 30;

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// Soft quality of the active placements in a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// Pairs of exams sharing students on the same day.
    pub same_day_pairs: usize,
    /// Summed classroom proximity over those pairs.
    pub proximity_cost: u64,
    /// Higher is better; zero when no cohort sits two exams in one day.
    pub score: i64,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}

impl QualityReport {
    pub fn assess(catalogues: Catalogues<'_>, ledger: &Ledger) -> Self {
        let mut report = Self::default();
        let by_date = ledger
            .active()
            .map(|p| (p.slot.date, p))
            .into_group_map();

        for (date, day) in by_date.into_iter().sorted_by_key(|(date, _)| *date) {
            let day: Vec<&Placement> = day.into_iter().sorted_by_key(|p| (p.slot, p.id)).collect();
            for (a, b) in day.iter().tuple_combinations() {
                let (Some(first), Some(second)) = (
                    catalogues.demand.exam(a.exam_id),
                    catalogues.demand.exam(b.exam_id),
                ) else {
                    continue;
                };
                if !first.shares_students(second) {
                    continue;
                }

                report.same_day_pairs += 1;
                report.unmet_soft_constraints.push(UnmetSoftConstraint {
                    constraint_type: "Spread Cohort Exams".to_string(),
                    description: format!(
                        "Exams {} and {} share students and are both held on {}.",
                        a.exam_id, b.exam_id, date
                    ),
                });

                let distance = catalogues.resources.proximity(a.classroom_id, b.classroom_id);
                report.proximity_cost += u64::from(distance);
                if distance >= conflict::DIFFERENT_LOCATION {
                    report.unmet_soft_constraints.push(UnmetSoftConstraint {
                        constraint_type: "Keep Cohort Exams Close".to_string(),
                        description: format!(
                            "Exams {} (classroom {}) and {} (classroom {}) on {} are in different locations.",
                            a.exam_id, a.classroom_id, b.exam_id, b.classroom_id, date
                        ),
                    });
                }
            }
        }

        let penalty = report.same_day_pairs as u64 + report.proximity_cost;
        report.score = -i64::try_from(penalty).unwrap_or(i64::MAX);
        report
    }
}

/// Counts over a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatistics {
    pub total: usize,
    pub planned: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub by_date: BTreeMap<NaiveDate, usize>,
    pub by_classroom: BTreeMap<ClassroomId, usize>,
    /// Seats taken by active placements.
    pub total_students: u64,
    /// Active placements over classroom-slot pairs, in percent.
    pub utilization_rate: f64,
    /// Classrooms without any active placement.
    pub unused_classrooms: Vec<ClassroomId>,
}

impl LedgerStatistics {
    pub fn compute(catalogues: Catalogues<'_>, ledger: &Ledger, slot_count: usize) -> Self {
        let mut stats = Self {
            total: ledger.placements().len(),
            ..Self::default()
        };
        for placement in ledger.placements() {
            match placement.status {
                PlacementStatus::Planned => stats.planned += 1,
                PlacementStatus::Confirmed => stats.confirmed += 1,
                PlacementStatus::Cancelled => stats.cancelled += 1,
            }
        }

        let mut active = 0usize;
        for placement in ledger.active() {
            active += 1;
            *stats.by_date.entry(placement.slot.date).or_default() += 1;
            *stats.by_classroom.entry(placement.classroom_id).or_default() += 1;
            if let Some(exam) = catalogues.demand.exam(placement.exam_id) {
                stats.total_students += u64::from(exam.cohort_size);
            }
        }

        stats.unused_classrooms = catalogues
            .resources
            .classrooms()
            .iter()
            .map(|c| c.id)
            .filter(|id| !stats.by_classroom.contains_key(id))
            .collect();

        let capacity = catalogues.resources.classrooms().len() * slot_count;
        if capacity > 0 {
            let rate = active as f64 / capacity as f64 * 100.0;
            stats.utilization_rate = (rate * 100.0).round() / 100.0;
        }
        stats
    }
}

/// Non-blocking observations about a manual placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Warning {
    Weekend { date: NaiveDate },
    HighOccupancy { percent: u32 },
    LongSlot { spare_minutes: i64 },
}

/// Outcome of checking a placement request without recording it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementCheck {
    pub valid: bool,
    pub exclusions: Vec<Exclusion>,
    pub errors: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl PlacementCheck {
    fn reject(&mut self, err: LedgerError) {
        self.errors.push(err.to_string());
    }
}

/// Runs every check `Ledger::add` would, collecting all failures instead of
/// stopping at the first, plus warnings.
pub fn check_placement(
    catalogues: Catalogues<'_>,
    ledger: &Ledger,
    request: &PlacementRequest,
) -> PlacementCheck {
    let mut check = PlacementCheck::default();
    let Some(exam) = catalogues.demand.exam(request.exam_id) else {
        check.reject(LedgerError::UnknownExam(request.exam_id));
        return check;
    };
    let Some(classroom) = catalogues.resources.classroom(request.classroom_id) else {
        check.reject(LedgerError::UnknownClassroom(request.classroom_id));
        return check;
    };
    let Some(lecturer) = catalogues.resources.lecturer(exam.lecturer_id) else {
        check.reject(LedgerError::UnknownLecturer(exam.lecturer_id));
        return check;
    };
    let slot = request.slot;

    if is_weekend(slot.date) {
        check.warnings.push(Warning::Weekend { date: slot.date });
    }

    let reasons = conflict::infeasibility(exam, lecturer, classroom, &slot);
    if !reasons.is_empty() {
        check.exclusions.extend(reasons.iter().copied());
        check.reject(LedgerError::Infeasible { reasons });
    }
    if let Some(existing) = ledger.active_for_exam(exam.id) {
        check.reject(LedgerError::AlreadyScheduled {
            exam: exam.id,
            placement: existing.id,
        });
    }
    let booking = Booking::candidate(exam, classroom.id, slot);
    for (placement, kinds) in ledger.collisions_with(catalogues.demand, &booking) {
        check.exclusions.extend(kinds.iter().map(|&k| Exclusion::from(k)));
        check.reject(LedgerError::Conflict { placement, kinds });
    }
    check.exclusions.sort();
    check.exclusions.dedup();

    if classroom.capacity >= exam.cohort_size {
        let percent = u64::from(exam.cohort_size) * 100 / u64::from(classroom.capacity.max(1));
        let percent = u32::try_from(percent).unwrap_or(u32::MAX);
        if percent > HIGH_OCCUPANCY_PERCENT {
            check.warnings.push(Warning::HighOccupancy { percent });
        }
    }
    let spare = slot.duration_minutes() - i64::from(exam.duration_minutes);
    if spare > LONG_SLOT_SPARE_MINUTES {
        check.warnings.push(Warning::LongSlot {
            spare_minutes: spare,
        });
    }

    check.valid = check.errors.is_empty();
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Classroom, DemandCatalogue, Exam, ExamType, Lecturer, Origin, ResourceCatalogue, TimeSlot};
    use chrono::NaiveTime;

    fn slot(d: u32, start: u32, end: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        )
    }

    fn fixture() -> (ResourceCatalogue, DemandCatalogue) {
        let resources = ResourceCatalogue::new(
            vec![
                Classroom::new(1, 10).with_location("M"),
                Classroom::new(2, 10).with_location("M"),
                Classroom::new(3, 10).with_location("S"),
            ],
            vec![Lecturer::new(1), Lecturer::new(2), Lecturer::new(3)],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students(1..=9),
            Exam::new(2, "B", ExamType::Final, 2).with_students(5..=8),
            Exam::new(3, "C", ExamType::Final, 3).with_students(1..=3),
        ]);
        (resources, demand)
    }

    #[test]
    fn test_quality_counts_same_day_cohort_pairs() {
        let (resources, demand) = fixture();
        let catalogues = Catalogues::new(&resources, &demand);
        let mut ledger = Ledger::new();
        ledger.insert(demand.exam(1).unwrap(), 1, slot(6, 9, 11), Origin::Solver);
        ledger.insert(demand.exam(2).unwrap(), 2, slot(6, 14, 16), Origin::Solver);
        ledger.insert(demand.exam(3).unwrap(), 3, slot(6, 16, 18), Origin::Solver);

        let report = QualityReport::assess(catalogues, &ledger);
        // 1-2 share students in the same block, 1-3 share students across blocks
        assert_eq!(report.same_day_pairs, 2);
        assert_eq!(
            report.proximity_cost,
            u64::from(conflict::SAME_LOCATION + conflict::DIFFERENT_LOCATION)
        );
        assert_eq!(report.score, -13);
        assert_eq!(report.unmet_soft_constraints.len(), 3);
        assert!(report.unmet_soft_constraints[0].to_string().starts_with("[Spread Cohort Exams]"));
    }

    #[test]
    fn test_quality_of_spread_schedule() {
        let (resources, demand) = fixture();
        let catalogues = Catalogues::new(&resources, &demand);
        let mut ledger = Ledger::new();
        ledger.insert(demand.exam(1).unwrap(), 1, slot(6, 9, 11), Origin::Solver);
        ledger.insert(demand.exam(2).unwrap(), 1, slot(7, 9, 11), Origin::Solver);
        assert_eq!(QualityReport::assess(catalogues, &ledger), QualityReport::default());
    }

    #[test]
    fn test_statistics() {
        let (resources, demand) = fixture();
        let catalogues = Catalogues::new(&resources, &demand);
        let mut ledger = Ledger::new();
        let a = ledger.insert(demand.exam(1).unwrap(), 1, slot(6, 9, 11), Origin::Solver);
        let b = ledger.insert(demand.exam(2).unwrap(), 1, slot(7, 9, 11), Origin::Solver);
        ledger.insert(demand.exam(3).unwrap(), 2, slot(7, 9, 11), Origin::Solver);
        ledger.confirm(a).unwrap();
        ledger.cancel(b).unwrap();

        let stats = LedgerStatistics::compute(catalogues, &ledger, 4);
        assert_eq!((stats.total, stats.planned, stats.confirmed, stats.cancelled), (3, 1, 1, 1));
        assert_eq!(stats.by_classroom.get(&1), Some(&1));
        assert_eq!(stats.by_date.len(), 2);
        assert_eq!(stats.total_students, 12);
        assert_eq!(stats.unused_classrooms, vec![3]);
        // 2 active over 3 classrooms x 4 slots
        assert!((stats.utilization_rate - 16.67).abs() < 1e-9);
    }

    #[test]
    fn test_check_collects_errors_and_warnings() {
        let (resources, demand) = fixture();
        let catalogues = Catalogues::new(&resources, &demand);
        let mut ledger = Ledger::new();
        ledger.insert(demand.exam(1).unwrap(), 1, slot(6, 9, 11), Origin::Solver);

        let request = PlacementRequest::new(2, 1, slot(6, 10, 12));
        let check = check_placement(catalogues, &ledger, &request);
        assert!(!check.valid);
        assert_eq!(
            check.exclusions,
            vec![Exclusion::ClassroomCollision, Exclusion::StudentOverlap]
        );
        assert_eq!(check.errors.len(), 1);
        // 60 minute exam in a 120 minute slot
        assert_eq!(check.warnings, vec![Warning::LongSlot { spare_minutes: 60 }]);
        assert_eq!(ledger.placements().len(), 1);
    }

    #[test]
    fn test_check_warns_on_weekend_and_full_room() {
        let (resources, demand) = fixture();
        let catalogues = Catalogues::new(&resources, &demand);
        let ledger = Ledger::new();

        // Saturday; the default lecturer does not work weekends
        let request = PlacementRequest::new(1, 3, slot(11, 9, 10));
        let check = check_placement(catalogues, &ledger, &request);
        assert!(!check.valid);
        assert_eq!(check.exclusions, vec![Exclusion::LecturerAvailability]);
        assert_eq!(
            check.warnings,
            vec![
                Warning::Weekend {
                    date: NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()
                },
                Warning::HighOccupancy { percent: 90 },
            ]
        );

        let ok = check_placement(catalogues, &ledger, &PlacementRequest::new(3, 3, slot(6, 9, 10)));
        assert!(ok.valid);
        assert!(ok.errors.is_empty());

        let unknown = check_placement(catalogues, &ledger, &PlacementRequest::new(9, 3, slot(6, 9, 10)));
        assert_eq!(unknown.errors, vec!["unknown exam 9".to_string()]);
    }
}
