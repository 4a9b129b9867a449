//! The schedule ledger: every placement of a run, cancelled ones included.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::conflict::{self, Booking, Collision};
use crate::data::{
    Catalogues, ClassroomId, DemandCatalogue, Exam, ExamId, LecturerId, Origin, Placement,
    PlacementId, PlacementStatus, TimeSlot,
};
use crate::error::LedgerError;

/// A manual placement request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub exam_id: ExamId,
    pub classroom_id: ClassroomId,
    pub slot: TimeSlot,
    /// Record the placement as already confirmed.
    #[serde(default)]
    pub confirmed: bool,
}

impl PlacementRequest {
    pub fn new(exam_id: ExamId, classroom_id: ClassroomId, slot: TimeSlot) -> Self {
        Self {
            exam_id,
            classroom_id,
            slot,
            confirmed: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// What an active-placement query is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Classroom(ClassroomId),
    Lecturer(LecturerId),
    Exam(ExamId),
}

impl Subject {
    fn matches(self, placement: &Placement) -> bool {
        match self {
            Subject::Classroom(id) => placement.classroom_id == id,
            Subject::Lecturer(id) => placement.lecturer_id == id,
            Subject::Exam(id) => placement.exam_id == id,
        }
    }
}

/// Placements of a scheduling run, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    placements: Vec<Placement>,
    #[serde(default)]
    next_id: PlacementId,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every placement, cancelled ones included.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.position(id).map(|idx| &self.placements[idx])
    }

    pub fn active(&self) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(|p| p.is_active())
    }

    pub fn active_placements_for(&self, subject: Subject) -> Vec<&Placement> {
        self.active().filter(|p| subject.matches(p)).collect()
    }

    pub fn active_for_exam(&self, exam_id: ExamId) -> Option<&Placement> {
        self.active().find(|p| p.exam_id == exam_id)
    }

    pub fn is_scheduled(&self, exam_id: ExamId) -> bool {
        self.active_for_exam(exam_id).is_some()
    }

    /// Active placements `booking` would collide with, and on what.
    pub fn collisions_with(
        &self,
        demand: &DemandCatalogue,
        booking: &Booking<'_>,
    ) -> Vec<(PlacementId, Vec<Collision>)> {
        self.active()
            .filter(|p| p.slot.overlaps(&booking.slot))
            .filter_map(|p| {
                let kinds = conflict::collisions(booking, &Booking::placed(p, demand));
                (!kinds.is_empty()).then_some((p.id, kinds))
            })
            .collect()
    }

    /// Records a manual placement after checking it against the catalogues
    /// and every active placement.
    pub fn add(
        &mut self,
        catalogues: Catalogues<'_>,
        request: PlacementRequest,
    ) -> Result<PlacementId, LedgerError> {
        let exam = catalogues
            .demand
            .exam(request.exam_id)
            .ok_or(LedgerError::UnknownExam(request.exam_id))?;
        let classroom = catalogues
            .resources
            .classroom(request.classroom_id)
            .ok_or(LedgerError::UnknownClassroom(request.classroom_id))?;
        let lecturer = catalogues
            .resources
            .lecturer(exam.lecturer_id)
            .ok_or(LedgerError::UnknownLecturer(exam.lecturer_id))?;

        let reasons = conflict::infeasibility(exam, lecturer, classroom, &request.slot);
        if !reasons.is_empty() {
            return Err(LedgerError::Infeasible { reasons });
        }
        if let Some(existing) = self.active_for_exam(exam.id) {
            return Err(LedgerError::AlreadyScheduled {
                exam: exam.id,
                placement: existing.id,
            });
        }
        let booking = Booking::candidate(exam, classroom.id, request.slot);
        if let Some((placement, kinds)) = self
            .collisions_with(catalogues.demand, &booking)
            .into_iter()
            .next()
        {
            return Err(LedgerError::Conflict { placement, kinds });
        }

        let id = self.insert(exam, classroom.id, request.slot, Origin::Manual);
        if request.confirmed {
            self.confirm(id)?;
        }
        Ok(id)
    }

    /// Transitions a placement to cancelled. Cancelling twice is a no-op.
    pub fn cancel(&mut self, id: PlacementId) -> Result<(), LedgerError> {
        let placement = self.get_mut(id)?;
        placement.status = PlacementStatus::Cancelled;
        Ok(())
    }

    pub fn confirm(&mut self, id: PlacementId) -> Result<(), LedgerError> {
        let placement = self.get_mut(id)?;
        if placement.status == PlacementStatus::Cancelled {
            return Err(LedgerError::Cancelled(id));
        }
        placement.status = PlacementStatus::Confirmed;
        Ok(())
    }

    /// Cancels planned placements, optionally only those dated within `range`.
    ///
    /// Returns how many were cancelled.
    pub fn cancel_planned(&mut self, range: Option<RangeInclusive<NaiveDate>>) -> usize {
        let mut count = 0;
        for placement in &mut self.placements {
            let in_range = range
                .as_ref()
                .is_none_or(|r| r.contains(&placement.slot.date));
            if placement.status == PlacementStatus::Planned && in_range {
                placement.status = PlacementStatus::Cancelled;
                count += 1;
            }
        }
        count
    }

    /// Appends a planned placement without any checks.
    pub(crate) fn insert(
        &mut self,
        exam: &Exam,
        classroom_id: ClassroomId,
        slot: TimeSlot,
        origin: Origin,
    ) -> PlacementId {
        let id = self.allocate_id();
        self.placements.push(Placement {
            id,
            exam_id: exam.id,
            classroom_id,
            lecturer_id: exam.lecturer_id,
            slot,
            status: PlacementStatus::Planned,
            origin,
        });
        id
    }

    /// Removes a placement outright, leaving no audit trace.
    ///
    /// Only for undoing tentative solver placements; retracting the newest
    /// placement hands its id out again.
    pub(crate) fn retract(&mut self, id: PlacementId) -> Option<Placement> {
        let idx = self.position(id)?;
        let placement = self.placements.remove(idx);
        if placement.id + 1 == self.next_id {
            self.next_id = placement.id;
        }
        Some(placement)
    }

    /// Puts a retracted placement back where it was.
    pub(crate) fn restore(&mut self, placement: Placement) {
        let idx = self.placements.partition_point(|p| p.id < placement.id);
        self.next_id = self.next_id.max(placement.id + 1);
        self.placements.insert(idx, placement);
    }

    fn allocate_id(&mut self) -> PlacementId {
        // a deserialised ledger may carry a stale counter
        let floor = self.placements.last().map_or(0, |p| p.id + 1);
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        id
    }

    fn position(&self, id: PlacementId) -> Option<usize> {
        self.placements.iter().position(|p| p.id == id)
    }

    fn get_mut(&mut self, id: PlacementId) -> Result<&mut Placement, LedgerError> {
        let idx = self.position(id).ok_or(LedgerError::UnknownPlacement(id))?;
        Ok(&mut self.placements[idx])
    }
}
