use itertools::Itertools;
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::config::{SoftWeights, SolverConfig, Strategy};
use crate::conflict::{self, Booking, Exclusion};
use crate::data::{
    Catalogues, Classroom, DemandCatalogue, Exam, ExamId, Origin, PlacementId, PlacementStatus,
    ResourceCatalogue, TimeSlot,
};
use crate::error::{InputError, ValidationError};
use crate::ilp;
use crate::ledger::{Ledger, Subject};
use crate::report::{LedgerStatistics, QualityReport};
use crate::validate::{validate_demand, validate_ledger, validate_resources, validate_slots};

/// Why an exam came out of a run without a placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// The exam failed validation and was never offered to the solver.
    Invalid { errors: Vec<ValidationError> },
    /// Every (classroom, slot) candidate was ruled out.
    Unplaced {
        cause: Exclusion,
        /// How many candidates each exclusion ruled out.
        rejections: BTreeMap<Exclusion, usize>,
        candidates: usize,
        budget_exhausted: bool,
    },
}

impl Diagnostic {
    pub fn cause(&self) -> Option<Exclusion> {
        match self {
            Diagnostic::Invalid { .. } => None,
            Diagnostic::Unplaced { cause, .. } => Some(*cause),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Invalid { errors } => {
                write!(f, "invalid: {}", errors.iter().join("; "))
            }
            Diagnostic::Unplaced { cause, .. } => write!(f, "{cause}"),
        }
    }
}

/// Result of one scheduling run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub ledger: Ledger,
    /// Exams placed by this run, by id.
    pub placed: Vec<ExamId>,
    /// Valid exams left without a placement, by id.
    pub unplaced: Vec<ExamId>,
    /// Exams that failed validation, by id.
    pub rejected: Vec<ExamId>,
    pub diagnostics: BTreeMap<ExamId, Diagnostic>,
    pub quality: QualityReport,
    pub statistics: LedgerStatistics,
    /// Budget steps spent on backtracking.
    pub backtrack_steps: usize,
}

/// Places every pending exam it can and explains the rest.
///
/// Malformed resources, slots or ledgers abort the run. Malformed exams are rejected
/// individually and the remaining demand is still scheduled. Confirmed
/// placements in `existing` are never touched.
pub fn schedule(
    resources: &ResourceCatalogue,
    demand: &DemandCatalogue,
    existing: Ledger,
    config: &SolverConfig,
) -> Result<ScheduleOutcome, InputError> {
    let start_time = Instant::now();
    validate_resources(resources)?;
    let slots = validate_slots(config)?;
    validate_ledger(&existing)?;
    let catalogues = Catalogues::new(resources, demand);
    let mut ledger = existing;

    let considered = demand
        .exams()
        .iter()
        .filter(|exam| exam.has_exam && config.requires(exam.exam_type));
    let (valid, errors) = validate_demand(considered, resources);

    let mut diagnostics = BTreeMap::new();
    for (exam_id, errors) in errors.into_iter().into_group_map_by(ValidationError::exam_id) {
        for error in &errors {
            warn!("Rejecting exam {}: {}", exam_id, error);
        }
        diagnostics.insert(exam_id, Diagnostic::Invalid { errors });
    }
    let rejected: Vec<ExamId> = diagnostics.keys().copied().collect();

    let mut pending = Vec::new();
    let mut revised = 0;
    for exam in valid {
        let active: Vec<(PlacementId, PlacementStatus)> = ledger
            .active_placements_for(Subject::Exam(exam.id))
            .iter()
            .map(|p| (p.id, p.status))
            .collect();
        if active.is_empty() {
            pending.push(exam);
            continue;
        }
        let confirmed = active.iter().any(|(_, s)| *s == PlacementStatus::Confirmed);
        if confirmed || !config.revise_planned {
            continue;
        }
        for (id, _) in active {
            if ledger.cancel(id).is_ok() {
                revised += 1;
            }
        }
        pending.push(exam);
    }

    let order: Vec<&Exam> = pending
        .into_iter()
        .sorted_by_key(|exam| {
            let rooms = resources
                .classrooms()
                .iter()
                .filter(|c| c.capacity >= exam.cohort_size && c.suitable)
                .count();
            (Reverse(exam.cohort_size), rooms, exam.id)
        })
        .collect();

    info!(
        "Scheduling {} exams over {} classrooms and {} slots ({} rejected, {} planned placements revised)...",
        order.len(),
        resources.classrooms().len(),
        slots.len(),
        rejected.len(),
        revised
    );

    let mut exhausted = BTreeSet::new();
    let mut backtrack_steps = 0;
    let mut exact_done = false;
    if config.strategy == Strategy::Exact {
        match ilp::solve(catalogues, &mut ledger, &slots, &order, &config.weights) {
            Ok(placed) => {
                info!("Exact strategy placed {} of {} exams.", placed.len(), order.len());
                exact_done = true;
            }
            Err(e) => warn!("Exact strategy failed ({}), falling back to greedy.", e),
        }
    }
    if !exact_done {
        let mut run = GreedyRun::new(catalogues, ledger, &slots, config);
        for &exam in &order {
            if !run.place(exam) {
                trace!("Exam {} has no open candidate, attempting repair.", exam.id);
                if run.repair(exam) == Repair::OutOfBudget {
                    exhausted.insert(exam.id);
                }
            }
        }
        backtrack_steps = run.steps;
        ledger = run.ledger;
    }

    let mut placed = Vec::new();
    let mut unplaced = Vec::new();
    for exam in &order {
        if ledger.is_scheduled(exam.id) {
            placed.push(exam.id);
        } else {
            unplaced.push(exam.id);
            let diagnostic = diagnose(
                catalogues,
                &ledger,
                &slots,
                exam,
                exhausted.contains(&exam.id),
            );
            debug!("Exam {} left unplaced: {}", exam.id, diagnostic);
            diagnostics.insert(exam.id, diagnostic);
        }
    }
    placed.sort_unstable();
    unplaced.sort_unstable();

    let quality = QualityReport::assess(catalogues, &ledger);
    let statistics = LedgerStatistics::compute(catalogues, &ledger, slots.len());
    info!(
        "Placed {} exams, {} unplaced, score {} in {:.2?}.",
        placed.len(),
        unplaced.len(),
        quality.score,
        start_time.elapsed()
    );

    Ok(ScheduleOutcome {
        ledger,
        placed,
        unplaced,
        rejected,
        diagnostics,
        quality,
        statistics,
        backtrack_steps,
    })
}

/// Indexes into a run's sorted classrooms and slots.
type Candidate = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    Fixed,
    Failed,
    /// Stopped with undo depths or candidates still untried.
    OutOfBudget,
}

/// Working state of one greedy pass.
struct GreedyRun<'a> {
    catalogues: Catalogues<'a>,
    slots: &'a [TimeSlot],
    /// Classrooms by capacity, then id.
    rooms: Vec<&'a Classroom>,
    weights: SoftWeights,
    max_undo_depth: usize,
    budget: usize,
    steps: usize,
    ledger: Ledger,
    /// Placements made by this run, oldest first.
    stack: Vec<(&'a Exam, PlacementId)>,
}

impl<'a> GreedyRun<'a> {
    fn new(
        catalogues: Catalogues<'a>,
        ledger: Ledger,
        slots: &'a [TimeSlot],
        config: &SolverConfig,
    ) -> Self {
        let rooms = catalogues
            .resources
            .classrooms()
            .iter()
            .sorted_by_key(|c| (c.capacity, c.id))
            .collect();
        Self {
            catalogues,
            slots,
            rooms,
            weights: config.weights,
            max_undo_depth: config.max_undo_depth,
            budget: config.backtrack_budget,
            steps: 0,
            ledger,
            stack: Vec::new(),
        }
    }

    /// Feasible candidates that collide with no active placement, in
    /// enumeration order.
    fn open_candidates(&self, exam: &Exam) -> Vec<Candidate> {
        let Some(lecturer) = self.catalogues.resources.lecturer(exam.lecturer_id) else {
            return Vec::new();
        };
        let mut open = Vec::new();
        for (r, room) in self.rooms.iter().enumerate() {
            for (s, slot) in self.slots.iter().enumerate() {
                if !conflict::feasible(exam, lecturer, room, slot) {
                    continue;
                }
                let booking = Booking::candidate(exam, room.id, *slot);
                let blocked = self
                    .ledger
                    .active()
                    .any(|p| conflict::conflicts(&booking, &Booking::placed(p, self.catalogues.demand)));
                if !blocked {
                    open.push((r, s));
                }
            }
        }
        trace!("Exam {} has {} open candidates.", exam.id, open.len());
        open
    }

    fn has_feasible_candidate(&self, exam: &Exam) -> bool {
        let Some(lecturer) = self.catalogues.resources.lecturer(exam.lecturer_id) else {
            return false;
        };
        self.rooms
            .iter()
            .cartesian_product(self.slots)
            .any(|(room, slot)| conflict::feasible(exam, lecturer, room, slot))
    }

    /// Weighted cost of a candidate and its raw distance to the cohort's
    /// other exams that day.
    fn soft_cost(&self, exam: &Exam, (r, s): Candidate) -> (f64, u32) {
        let room = self.rooms[r];
        let slot = &self.slots[s];
        let wasted = room.capacity.saturating_sub(exam.cohort_size);

        let mut distance = 0u32;
        let mut same_day = 0u32;
        for placement in self.ledger.active().filter(|p| p.slot.date == slot.date) {
            let shares = self
                .catalogues
                .demand
                .exam(placement.exam_id)
                .is_some_and(|other| other.id != exam.id && other.shares_students(exam));
            if shares {
                distance += self.catalogues.resources.proximity(room.id, placement.classroom_id);
                same_day += 1;
            }
        }

        let weighted = self.weights.capacity * f64::from(wasted)
            + self.weights.proximity * f64::from(distance)
            + self.weights.spread * f64::from(same_day);
        (weighted, distance)
    }

    /// Cheapest candidate; the first one wins ties.
    fn best(&self, exam: &Exam, open: &[Candidate]) -> Option<Candidate> {
        open.iter()
            .map(|&c| (c, self.soft_cost(exam, c)))
            .min_by(|(_, a), (_, b)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(c, _)| c)
    }

    fn commit(&mut self, exam: &'a Exam, (r, s): Candidate) -> PlacementId {
        let room = self.rooms[r];
        let slot = self.slots[s];
        let id = self.ledger.insert(exam, room.id, slot, Origin::Solver);
        debug!("Placed exam {} in classroom {} at {}.", exam.id, room.id, slot);
        self.stack.push((exam, id));
        id
    }

    /// Places `exam` on its cheapest open candidate, if any.
    fn place(&mut self, exam: &'a Exam) -> bool {
        let open = self.open_candidates(exam);
        match self.best(exam, &open) {
            Some(candidate) => {
                self.commit(exam, candidate);
                true
            }
            None => false,
        }
    }

    /// Drops every placement made after `mark`.
    fn unwind(&mut self, mark: usize) {
        while self.stack.len() > mark {
            if let Some((_, id)) = self.stack.pop() {
                self.ledger.retract(id);
            }
        }
    }

    /// Undoes up to `max_undo_depth` recent placements to make room for
    /// `exam`, re-placing the undone exams afterwards.
    ///
    /// Each candidate tried for `exam` costs one budget step. On failure the
    /// ledger is left exactly as it was.
    fn repair(&mut self, exam: &'a Exam) -> Repair {
        if !self.has_feasible_candidate(exam) {
            return Repair::Failed;
        }
        let mut outcome = Repair::Failed;
        let max_depth = self.max_undo_depth.min(self.stack.len());
        for depth in 1..=max_depth {
            if self.budget == 0 {
                outcome = Repair::OutOfBudget;
                break;
            }
            let base = self.stack.len() - depth;
            let undone = self.stack.split_off(base);
            let mut removed = Vec::with_capacity(undone.len());
            for &(_, id) in undone.iter().rev() {
                if let Some(placement) = self.ledger.retract(id) {
                    removed.push(placement);
                }
            }

            for candidate in self.open_candidates(exam) {
                if self.budget == 0 {
                    outcome = Repair::OutOfBudget;
                    break;
                }
                self.budget -= 1;
                self.steps += 1;

                let mark = self.stack.len();
                self.commit(exam, candidate);
                if undone.iter().all(|&(other, _)| self.place(other)) {
                    debug!(
                        "Repaired exam {} by undoing {} placements ({} steps left).",
                        exam.id, depth, self.budget
                    );
                    return Repair::Fixed;
                }
                self.unwind(mark);
            }

            for placement in removed.into_iter().rev() {
                self.ledger.restore(placement);
            }
            self.stack.extend(undone);
            if outcome == Repair::OutOfBudget {
                break;
            }
        }
        outcome
    }
}

/// Explains why no candidate was left for `exam` in `ledger`.
pub fn diagnose(
    catalogues: Catalogues<'_>,
    ledger: &Ledger,
    slots: &[TimeSlot],
    exam: &Exam,
    budget_exhausted: bool,
) -> Diagnostic {
    let lecturer = catalogues.resources.lecturer(exam.lecturer_id);
    let mut rejections: BTreeMap<Exclusion, usize> = BTreeMap::new();
    let mut shared: Option<BTreeSet<Exclusion>> = None;
    let mut candidates = 0;

    for classroom in catalogues.resources.classrooms() {
        for slot in slots {
            candidates += 1;
            let mut reasons: BTreeSet<Exclusion> = lecturer
                .map(|l| conflict::infeasibility(exam, l, classroom, slot))
                .unwrap_or_default()
                .into_iter()
                .collect();
            let booking = Booking::candidate(exam, classroom.id, *slot);
            for (_, kinds) in ledger.collisions_with(catalogues.demand, &booking) {
                reasons.extend(kinds.into_iter().map(Exclusion::from));
            }

            for reason in &reasons {
                *rejections.entry(*reason).or_default() += 1;
            }
            shared = Some(match shared {
                None => reasons,
                Some(prev) => prev.intersection(&reasons).copied().collect(),
            });
        }
    }

    let cause = shared
        .and_then(|s| s.first().copied())
        .or_else(|| {
            rejections
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(reason, _)| *reason)
        })
        .unwrap_or(Exclusion::NoCandidates);

    Diagnostic::Unplaced {
        cause,
        rejections,
        candidates,
        budget_exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExamType, Lecturer};
    use crate::ledger::PlacementRequest;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn slot(d: u32, start: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(start + 2, 0, 0).unwrap(),
        )
    }

    // 2025-01-06 is a Monday, 2025-01-07 a Tuesday
    fn monday_tuesday() -> SolverConfig {
        SolverConfig::default().with_slots(vec![slot(6, 9), slot(7, 9)])
    }

    /// One classroom; the big exam's lecturer works `big_days`, the small
    /// exam's lecturer only Mondays.
    fn dead_end(big_days: &[Weekday]) -> (ResourceCatalogue, DemandCatalogue) {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 10)],
            vec![
                Lecturer::new(1).with_days(big_days.iter().copied()),
                Lecturer::new(2).with_days([Weekday::Mon]),
            ],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "BIG", ExamType::Final, 1).with_students(1..=10),
            Exam::new(2, "SMALL", ExamType::Final, 2).with_students(11..=15),
        ]);
        (resources, demand)
    }

    #[test]
    fn test_most_constrained_first() {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 20), Classroom::new(2, 50)],
            vec![Lecturer::new(1), Lecturer::new(2)],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students(1..=10),
            Exam::new(2, "B", ExamType::Final, 2).with_students(11..=50),
        ]);
        let config = SolverConfig::default().with_slots(vec![slot(6, 9)]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        // the 40 student exam goes first and takes the only room that fits
        let placements = outcome.ledger.placements();
        assert_eq!(placements[0].exam_id, 2);
        assert_eq!(placements[0].classroom_id, 2);
        assert_eq!(placements[1].classroom_id, 1);
        assert_eq!(outcome.placed, vec![1, 2]);
        assert_eq!(outcome.backtrack_steps, 0);
    }

    #[test]
    fn test_backtracking_repairs_dead_end() {
        let (resources, demand) = dead_end(&[Weekday::Mon, Weekday::Tue]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &monday_tuesday()).unwrap();

        assert_eq!(outcome.placed, vec![1, 2]);
        assert!(outcome.unplaced.is_empty());
        assert_eq!(outcome.backtrack_steps, 1);
        let small = outcome.ledger.active_for_exam(2).unwrap();
        let big = outcome.ledger.active_for_exam(1).unwrap();
        assert_eq!(small.slot, slot(6, 9));
        assert_eq!(big.slot, slot(7, 9));
        assert_eq!(outcome.ledger.placements().len(), 2);
    }

    #[test]
    fn test_failed_repair_restores_ledger() {
        let (resources, demand) = dead_end(&[Weekday::Mon]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &monday_tuesday()).unwrap();

        assert_eq!(outcome.placed, vec![1]);
        assert_eq!(outcome.unplaced, vec![2]);
        let placements = outcome.ledger.placements();
        assert_eq!(placements.len(), 1);
        assert_eq!((placements[0].id, placements[0].exam_id), (0, 1));
        assert_eq!(placements[0].slot, slot(6, 9));

        match &outcome.diagnostics[&2] {
            Diagnostic::Unplaced {
                budget_exhausted,
                candidates,
                ..
            } => {
                assert!(!budget_exhausted);
                assert_eq!(*candidates, 2);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_exhausted_budget_is_reported() {
        let (resources, demand) = dead_end(&[Weekday::Mon, Weekday::Tue]);
        let config = monday_tuesday().with_backtrack_budget(0);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        assert_eq!(outcome.unplaced, vec![2]);
        let diagnostic = &outcome.diagnostics[&2];
        // Monday is taken, Tuesday is off for the lecturer
        assert_eq!(diagnostic.cause(), Some(Exclusion::LecturerAvailability));
        assert!(matches!(
            diagnostic,
            Diagnostic::Unplaced {
                budget_exhausted: true,
                ..
            }
        ));
    }

    #[test]
    fn test_impossible_exam_does_not_blame_the_budget() {
        let (resources, _) = dead_end(&[Weekday::Mon]);
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students(1..=5),
            Exam::new(2, "HUGE", ExamType::Final, 2).with_students(6..=30),
        ]);
        let config = monday_tuesday().with_backtrack_budget(0);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        assert_eq!(outcome.placed, vec![1]);
        let diagnostic = &outcome.diagnostics[&2];
        assert_eq!(diagnostic.cause(), Some(Exclusion::Capacity));
        assert!(matches!(
            diagnostic,
            Diagnostic::Unplaced {
                budget_exhausted: false,
                ..
            }
        ));
    }

    /// One classroom over Monday to Wednesday. The third exam fits only on
    /// Monday, which the first exam takes; the second exam's lecturer works
    /// `second_days`.
    fn deep_dead_end(second_days: &[Weekday]) -> (ResourceCatalogue, DemandCatalogue, SolverConfig) {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 10)],
            vec![
                Lecturer::new(1).with_days([Weekday::Mon, Weekday::Tue]),
                Lecturer::new(2).with_days(second_days.iter().copied()),
                Lecturer::new(3).with_days([Weekday::Mon]),
            ],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "FIRST", ExamType::Final, 1).with_students(1..=10),
            Exam::new(2, "SECOND", ExamType::Final, 2).with_students(11..=19),
            Exam::new(3, "THIRD", ExamType::Final, 3).with_students(20..=24),
        ]);
        let config = SolverConfig::default().with_slots(vec![slot(6, 9), slot(7, 9), slot(8, 9)]);
        (resources, demand, config)
    }

    #[test]
    fn test_repair_can_undo_two_placements() {
        let (resources, demand, config) = deep_dead_end(&[Weekday::Tue, Weekday::Wed]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        assert_eq!(outcome.placed, vec![1, 2, 3]);
        assert_eq!(outcome.backtrack_steps, 1);
        let slot_of = |id| outcome.ledger.active_for_exam(id).map(|p| p.slot);
        assert_eq!(slot_of(3), Some(slot(6, 9)));
        assert_eq!(slot_of(1), Some(slot(7, 9)));
        assert_eq!(slot_of(2), Some(slot(8, 9)));
        assert_eq!(outcome.ledger.placements().len(), 3);
    }

    #[test]
    fn test_undo_depth_limits_repair() {
        let (resources, demand, config) = deep_dead_end(&[Weekday::Tue, Weekday::Wed]);
        let config = config.with_max_undo_depth(1);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        assert_eq!(outcome.placed, vec![1, 2]);
        assert_eq!(outcome.unplaced, vec![3]);
        // undoing the second exam alone never opens Monday
        assert_eq!(outcome.backtrack_steps, 0);
    }

    #[test]
    fn test_failed_deep_repair_restores_ledger() {
        let (resources, demand, config) = deep_dead_end(&[Weekday::Tue]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        assert_eq!(outcome.unplaced, vec![3]);
        assert_eq!(outcome.backtrack_steps, 1);

        let mut expected = Ledger::new();
        expected.insert(&demand.exams()[0], 1, slot(6, 9), Origin::Solver);
        expected.insert(&demand.exams()[1], 1, slot(7, 9), Origin::Solver);
        assert_eq!(outcome.ledger, expected);
        assert_eq!(serde_json::to_value(&outcome.ledger).unwrap()["nextId"], 2);
    }

    /// A cohort sitting its first exam in block M on Monday morning, and a
    /// second exam on Monday afternoon with two 30 seat rooms to choose from.
    fn shared_cohort_day() -> (ResourceCatalogue, DemandCatalogue, SolverConfig) {
        let resources = ResourceCatalogue::new(
            vec![
                Classroom::new(1, 50).with_location("M"),
                Classroom::new(2, 30).with_location("S"),
                Classroom::new(3, 30).with_location("M"),
            ],
            vec![Lecturer::new(1), Lecturer::new(2)],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students(1..=40),
            Exam::new(2, "B", ExamType::Final, 2).with_students(31..=50),
        ]);
        let config = SolverConfig::default().with_slots(vec![slot(6, 9), slot(6, 14)]);
        (resources, demand, config)
    }

    #[test]
    fn test_proximity_breaks_capacity_ties() {
        let (resources, demand, config) = shared_cohort_day();
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        let first = outcome.ledger.active_for_exam(1).unwrap();
        assert_eq!((first.classroom_id, first.slot), (1, slot(6, 9)));
        // rooms 2 and 3 waste the same seats; room 3 shares the block
        let second = outcome.ledger.active_for_exam(2).unwrap();
        assert_eq!((second.classroom_id, second.slot), (3, slot(6, 14)));
    }

    #[test]
    fn test_proximity_weight_overrides_smallest_room() {
        let (resources, demand, config) = shared_cohort_day();
        let config = config.with_weights(SoftWeights {
            capacity: 1.0,
            proximity: 25.0,
            spread: 0.0,
        });
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();

        // 30 wasted seats next door beat 10 wasted seats one room away
        let second = outcome.ledger.active_for_exam(2).unwrap();
        assert_eq!((second.classroom_id, second.slot), (1, slot(6, 14)));
    }

    #[test]
    fn test_unordered_ledger_aborts() {
        let (resources, demand) = dead_end(&[Weekday::Mon]);
        let cancelled = |id: u32| {
            serde_json::json!({
                "id": id, "examId": 1, "classroomId": 1, "lecturerId": 1,
                "slot": {"date": "2025-01-06", "start": "09:00:00", "end": "11:00:00"},
                "status": "cancelled", "origin": "manual"
            })
        };
        let existing: Ledger =
            serde_json::from_value(serde_json::json!({"placements": [cancelled(5), cancelled(2)]}))
                .unwrap();

        let err = schedule(&resources, &demand, existing, &monday_tuesday()).unwrap_err();
        assert_eq!(err, InputError::UnorderedPlacements { previous: 5, next: 2 });
    }

    #[test]
    fn test_shared_exclusion_is_the_cause() {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 5), Classroom::new(2, 5)],
            vec![Lecturer::new(1)],
        );
        let demand =
            DemandCatalogue::new(vec![Exam::new(1, "A", ExamType::Final, 1).with_students(1..=8)]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &monday_tuesday()).unwrap();

        let Diagnostic::Unplaced {
            cause,
            rejections,
            candidates,
            ..
        } = &outcome.diagnostics[&1]
        else {
            panic!("expected an unplaced diagnostic");
        };
        assert_eq!(*cause, Exclusion::Capacity);
        assert_eq!(rejections.get(&Exclusion::Capacity), Some(&4));
        assert_eq!(*candidates, 4);
        assert_eq!(outcome.diagnostics[&1].to_string(), "capacity");
    }

    #[test]
    fn test_no_slots_means_no_candidates() {
        let (resources, demand) = dead_end(&[Weekday::Mon]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &SolverConfig::default()).unwrap();
        assert_eq!(outcome.unplaced, vec![1, 2]);
        assert_eq!(outcome.diagnostics[&1].cause(), Some(Exclusion::NoCandidates));
    }

    #[test]
    fn test_rejected_exams_are_diagnosed_not_solved() {
        let (resources, _) = dead_end(&[Weekday::Mon]);
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "BIG", ExamType::Final, 1).with_students(1..=5),
            Exam::new(2, "BAD", ExamType::Final, 7).with_students([6]).with_duration(0),
        ]);
        let outcome = schedule(&resources, &demand, Ledger::new(), &monday_tuesday()).unwrap();

        assert_eq!(outcome.rejected, vec![2]);
        assert!(outcome.unplaced.is_empty());
        let Diagnostic::Invalid { errors } = &outcome.diagnostics[&2] else {
            panic!("expected an invalid diagnostic");
        };
        assert_eq!(errors.len(), 2);
        assert!(outcome.diagnostics[&2].to_string().starts_with("invalid: "));
        assert!(!outcome.ledger.is_scheduled(2));
    }

    #[test]
    fn test_skipped_exam_types_are_ignored() {
        let (resources, _) = dead_end(&[Weekday::Mon]);
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Quiz, 1).with_students(1..=5),
        ]);
        let config = monday_tuesday().skip_exam_type(ExamType::Quiz);
        let outcome = schedule(&resources, &demand, Ledger::new(), &config).unwrap();
        assert!(outcome.placed.is_empty());
        assert!(outcome.unplaced.is_empty());
        assert!(outcome.ledger.placements().is_empty());
    }

    #[test]
    fn test_planned_placements_are_revised_or_kept() {
        let (resources, demand) = dead_end(&[Weekday::Mon, Weekday::Tue]);
        let catalogues = Catalogues::new(&resources, &demand);
        let mut existing = Ledger::new();
        let old = existing
            .add(catalogues, PlacementRequest::new(2, 1, slot(6, 9)))
            .unwrap();

        let kept = schedule(&resources, &demand, existing.clone(), &monday_tuesday().keep_planned())
            .unwrap();
        assert_eq!(kept.placed, vec![1]);
        assert_eq!(kept.ledger.get(old).map(|p| p.status), Some(PlacementStatus::Planned));

        let revised = schedule(&resources, &demand, existing, &monday_tuesday()).unwrap();
        assert_eq!(revised.placed, vec![1, 2]);
        assert_eq!(
            revised.ledger.get(old).map(|p| p.status),
            Some(PlacementStatus::Cancelled)
        );
        assert_eq!(revised.ledger.active().count(), 2);
        assert_eq!(revised.statistics.cancelled, 1);
    }

    #[test]
    fn test_invalid_resources_abort() {
        let resources = ResourceCatalogue::new(vec![Classroom::new(1, 0)], vec![]);
        let demand = DemandCatalogue::new(vec![]);
        let err = schedule(&resources, &demand, Ledger::new(), &monday_tuesday()).unwrap_err();
        assert_eq!(err, InputError::ZeroCapacity { classroom: 1 });
    }

    #[test]
    fn test_diagnostic_json_shape() {
        let diagnostic = Diagnostic::Unplaced {
            cause: Exclusion::StudentOverlap,
            rejections: BTreeMap::from([(Exclusion::StudentOverlap, 2)]),
            candidates: 2,
            budget_exhausted: false,
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "unplaced");
        assert_eq!(json["cause"], "collision:student_overlap");
        assert_eq!(json["rejections"]["collision:student_overlap"], 2);
        assert_eq!(json["budgetExhausted"], false);
    }
}
