use chrono::{NaiveDate, NaiveTime};
use good_lp::{
    Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, default_solver,
    variable,
};
use itertools::Itertools;
use log::{info, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::config::SoftWeights;
use crate::conflict::{self, Booking};
use crate::data::{Catalogues, Classroom, Exam, ExamId, Origin, StudentId, TimeSlot};
use crate::ledger::Ledger;

/// places `exams` into `ledger` using the HiGHS ILP solver.
///
/// Maximises the number of placed exams; among equally large schedules the
/// one wasting fewer seats wins when the capacity weight is set. Returns the
/// ids placed, in candidate order.
pub(crate) fn solve(
    catalogues: Catalogues<'_>,
    ledger: &mut Ledger,
    slots: &[TimeSlot],
    exams: &[&Exam],
    weights: &SoftWeights,
) -> Result<Vec<ExamId>, String> {
    let start_time = Instant::now();

    // x_ecs = 1 if exam e sits in classroom c during slot s
    // pre-filter on feasibility and on the placements already in the ledger
    let mut candidates: Vec<(&Exam, &Classroom, TimeSlot)> = Vec::new();
    for &exam in exams {
        let Some(lecturer) = catalogues.resources.lecturer(exam.lecturer_id) else {
            continue;
        };
        for classroom in catalogues.resources.classrooms() {
            for slot in slots {
                if !conflict::feasible(exam, lecturer, classroom, slot) {
                    continue;
                }
                let booking = Booking::candidate(exam, classroom.id, *slot);
                let blocked = ledger
                    .active()
                    .any(|p| conflict::conflicts(&booking, &Booking::placed(p, catalogues.demand)));
                if !blocked {
                    candidates.push((exam, classroom, *slot));
                }
            }
        }
    }
    trace!(
        "Generated {} candidate variables out of a theoretical maximum of {}.",
        candidates.len(),
        exams.len() * catalogues.resources.classrooms().len() * slots.len()
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut problem = ProblemVariables::new();
    let vars = problem.add_vector(variable().binary(), candidates.len());

    // the waste penalty stays below one placement's worth over the whole run
    let penalty_scale = if weights.capacity > 0.0 {
        1.0 / (exams.len() as f64 + 1.0)
    } else {
        0.0
    };
    let objective: Expression = candidates
        .iter()
        .zip(&vars)
        .map(|((exam, classroom, _), var)| {
            let waste = f64::from(classroom.capacity.saturating_sub(exam.cohort_size))
                / f64::from(classroom.capacity.max(1));
            (1.0 - penalty_scale * waste) * *var
        })
        .sum();

    let mut model = problem
        .maximise(objective)
        .using(default_solver)
        .set_option("threads", 1) // single thread for reproducibility
        .set_option("random_seed", 1234)
        .set_option("log_to_console", "false");

    let mut added = 0;

    // each exam at most once
    let per_exam = candidates
        .iter()
        .zip(&vars)
        .map(|((exam, _, _), var)| (exam.id, *var))
        .into_group_map();
    for (_, group) in per_exam.into_iter().sorted_by_key(|(id, _)| *id) {
        added += at_most_one(&mut model, &group);
    }

    // exams sharing a student, deduplicated
    let mut by_student: BTreeMap<StudentId, BTreeSet<ExamId>> = BTreeMap::new();
    for exam in exams {
        for &student in &exam.students {
            by_student.entry(student).or_default().insert(exam.id);
        }
    }
    let student_groups: BTreeSet<BTreeSet<ExamId>> = by_student
        .into_values()
        .filter(|group| group.len() > 1)
        .collect();

    // no classroom, lecturer or student double-booked at any slot start
    let points: Vec<(NaiveDate, NaiveTime)> = slots
        .iter()
        .map(|s| (s.date, s.start))
        .sorted()
        .dedup()
        .collect();
    for (date, instant) in points {
        let live: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].2.covers(date, instant))
            .collect();

        let by_room = live
            .iter()
            .map(|&i| (candidates[i].1.id, vars[i]))
            .into_group_map();
        for (_, group) in by_room.into_iter().sorted_by_key(|(id, _)| *id) {
            added += at_most_one(&mut model, &group);
        }

        let by_lecturer = live
            .iter()
            .map(|&i| (candidates[i].0.lecturer_id, vars[i]))
            .into_group_map();
        for (_, group) in by_lecturer.into_iter().sorted_by_key(|(id, _)| *id) {
            added += at_most_one(&mut model, &group);
        }

        for exams_sharing in &student_groups {
            let group: Vec<Variable> = live
                .iter()
                .filter(|&&i| exams_sharing.contains(&candidates[i].0.id))
                .map(|&i| vars[i])
                .collect();
            added += at_most_one(&mut model, &group);
        }
    }
    info!(
        "ILP model has {} variables and {} constraints.",
        candidates.len(),
        added
    );

    let solution = model
        .solve()
        .map_err(|e| format!("no solution found, solver error: {}", e))?;
    info!("Solution found in {:.2?}", start_time.elapsed());

    let mut placed = Vec::new();
    for ((exam, classroom, slot), var) in candidates.iter().zip(&vars) {
        if solution.value(*var) > 0.9 {
            ledger.insert(exam, classroom.id, *slot, Origin::Solver);
            placed.push(exam.id);
        }
    }
    Ok(placed)
}

fn at_most_one(model: &mut impl SolverModel, group: &[Variable]) -> usize {
    if group.len() < 2 {
        return 0;
    }
    let total: Expression = group.iter().copied().sum();
    model.add_constraint(constraint!(total <= 1));
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DemandCatalogue, ExamType, Lecturer, ResourceCatalogue};
    use chrono::Weekday;

    fn slot(d: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_places_everything_a_small_instance_allows() {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 10)],
            vec![
                Lecturer::new(1),
                Lecturer::new(2).with_days([Weekday::Mon]),
            ],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "BIG", ExamType::Final, 1).with_students(1..=10),
            Exam::new(2, "SMALL", ExamType::Final, 2).with_students(11..=15),
        ]);
        let catalogues = Catalogues::new(&resources, &demand);
        let exams: Vec<&Exam> = demand.exams().iter().collect();
        let mut ledger = Ledger::new();

        let placed = solve(
            catalogues,
            &mut ledger,
            &[slot(6), slot(7)],
            &exams,
            &SoftWeights::default(),
        )
        .unwrap();

        assert_eq!(placed.len(), 2);
        assert_eq!(ledger.active_for_exam(2).map(|p| p.slot), Some(slot(6)));
        assert_eq!(ledger.active_for_exam(1).map(|p| p.slot), Some(slot(7)));
    }

    #[test]
    fn test_respects_existing_placements_and_shared_students() {
        let resources = ResourceCatalogue::new(
            vec![Classroom::new(1, 10), Classroom::new(2, 10)],
            vec![Lecturer::new(1), Lecturer::new(2), Lecturer::new(3)],
        );
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students([1, 2]),
            Exam::new(2, "B", ExamType::Final, 2).with_students([2, 3]),
            Exam::new(3, "C", ExamType::Final, 3).with_students([9]),
        ]);
        let catalogues = Catalogues::new(&resources, &demand);
        let mut ledger = Ledger::new();
        ledger.insert(&demand.exams()[2], 2, slot(6), Origin::Manual);

        let exams: Vec<&Exam> = demand.exams()[..2].iter().collect();
        let placed = solve(
            catalogues,
            &mut ledger,
            &[slot(6)],
            &exams,
            &SoftWeights::default(),
        )
        .unwrap();

        // one free room and a shared student: only one of the two fits
        assert_eq!(placed.len(), 1);
        assert_eq!(ledger.active().count(), 2);
        assert!(ledger.active().all(|p| p.slot == slot(6)));
        assert_eq!(
            ledger.active().filter(|p| p.classroom_id == 1).count(),
            1
        );
    }

    #[test]
    fn test_no_candidates_is_not_an_error() {
        let resources = ResourceCatalogue::new(vec![Classroom::new(1, 1)], vec![Lecturer::new(1)]);
        let demand = DemandCatalogue::new(vec![
            Exam::new(1, "A", ExamType::Final, 1).with_students([1, 2]),
        ]);
        let catalogues = Catalogues::new(&resources, &demand);
        let exams: Vec<&Exam> = demand.exams().iter().collect();
        let mut ledger = Ledger::new();
        let placed = solve(catalogues, &mut ledger, &[slot(6)], &exams, &SoftWeights::default());
        assert_eq!(placed, Ok(Vec::new()));
        assert!(ledger.placements().is_empty());
    }
}
