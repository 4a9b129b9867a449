use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::conflict;

// Type aliases for clarity
pub type ClassroomId = u32;
pub type LecturerId = u32;
pub type ExamId = u32;
pub type StudentId = u32;
pub type PlacementId = u64;

/// Kind of exam a course sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Midterm,
    Final,
    Makeup,
    Quiz,
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExamType::Midterm => "midterm",
            ExamType::Final => "final",
            ExamType::Makeup => "makeup",
            ExamType::Quiz => "quiz",
        };
        f.write_str(label)
    }
}

fn default_true() -> bool {
    true
}

/// Represents a physical classroom with a given capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: ClassroomId,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
    #[serde(default = "default_true")]
    pub suitable: bool,
    /// Building or block tag; derived from the name when left empty.
    #[serde(default)]
    pub location: String,
}

impl Classroom {
    pub fn new(id: ClassroomId, capacity: u32) -> Self {
        Self {
            id,
            name: String::new(),
            capacity,
            suitable: true,
            location: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn unsuitable(mut self) -> Self {
        self.suitable = false;
        self
    }

    /// Location tag used for proximity scoring.
    ///
    /// Falls back to the leading non-digit part of the name, so `"M101"`
    /// sits in block `"M"`.
    pub fn block(&self) -> &str {
        if !self.location.is_empty() {
            return &self.location;
        }
        let end = self
            .name
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(self.name.len());
        self.name[..end].trim()
    }
}

/// Weekdays a lecturer is assumed available on when nothing else is known.
pub fn default_available_days() -> HashSet<Weekday> {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
    .into_iter()
    .collect()
}

/// Represents a lecturer with their weekly availability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecturer {
    pub id: LecturerId,
    #[serde(default = "default_available_days")]
    pub available_days: HashSet<Weekday>,
}

impl Lecturer {
    pub fn new(id: LecturerId) -> Self {
        Self {
            id,
            available_days: default_available_days(),
        }
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.available_days = days.into_iter().collect();
        self
    }

    pub fn is_available_on(&self, day: Weekday) -> bool {
        self.available_days.contains(&day)
    }
}

/// One schedulable unit: a course sitting one exam type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: ExamId,
    pub course_code: String,
    pub exam_type: ExamType,
    pub lecturer_id: LecturerId,
    #[serde(default)]
    pub students: BTreeSet<StudentId>,
    pub duration_minutes: u32,
    pub cohort_size: u32,
    #[serde(default = "default_true")]
    pub has_exam: bool,
}

impl Exam {
    pub fn new(
        id: ExamId,
        course_code: impl Into<String>,
        exam_type: ExamType,
        lecturer_id: LecturerId,
    ) -> Self {
        Self {
            id,
            course_code: course_code.into(),
            exam_type,
            lecturer_id,
            students: BTreeSet::new(),
            duration_minutes: 60,
            cohort_size: 0,
            has_exam: true,
        }
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Sets the enrolled students; the cohort size follows the enrolment.
    pub fn with_students(mut self, students: impl IntoIterator<Item = StudentId>) -> Self {
        self.students = students.into_iter().collect();
        self.cohort_size = u32::try_from(self.students.len()).unwrap_or(u32::MAX);
        self
    }

    pub fn with_cohort_size(mut self, cohort_size: u32) -> Self {
        self.cohort_size = cohort_size;
        self
    }

    pub fn without_exam(mut self) -> Self {
        self.has_exam = false;
        self
    }

    pub fn shares_students(&self, other: &Exam) -> bool {
        !self.students.is_disjoint(&other.students)
    }
}

/// A `[start, end)` window on one exam day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { date, start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    pub fn covers(&self, date: NaiveDate, instant: NaiveTime) -> bool {
        self.date == date && self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.date,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    Planned,
    Confirmed,
    Cancelled,
}

impl PlacementStatus {
    pub fn is_active(self) -> bool {
        self != PlacementStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Solver,
    Manual,
}

/// An exam bound to a classroom and time slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub id: PlacementId,
    pub exam_id: ExamId,
    pub classroom_id: ClassroomId,
    pub lecturer_id: LecturerId,
    pub slot: TimeSlot,
    pub status: PlacementStatus,
    pub origin: Origin,
}

impl Placement {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Wire shape of a [`ResourceCatalogue`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecords {
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    #[serde(default)]
    pub lecturers: Vec<Lecturer>,
    /// Classroom pairs in different blocks that are still close to each other.
    #[serde(default)]
    pub adjacent: Vec<(ClassroomId, ClassroomId)>,
}

/// Classrooms and lecturers available to one scheduling run.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalogue {
    records: ResourceRecords,
    classroom_index: HashMap<ClassroomId, usize>,
    lecturer_index: HashMap<LecturerId, usize>,
    adjacency: HashSet<(ClassroomId, ClassroomId)>,
}

impl ResourceCatalogue {
    pub fn new(classrooms: Vec<Classroom>, lecturers: Vec<Lecturer>) -> Self {
        Self::from(ResourceRecords {
            classrooms,
            lecturers,
            adjacent: Vec::new(),
        })
    }

    pub fn with_adjacent(self, pairs: impl IntoIterator<Item = (ClassroomId, ClassroomId)>) -> Self {
        let mut records = self.records;
        records.adjacent.extend(pairs);
        Self::from(records)
    }

    pub fn classrooms(&self) -> &[Classroom] {
        &self.records.classrooms
    }

    pub fn lecturers(&self) -> &[Lecturer] {
        &self.records.lecturers
    }

    pub fn adjacent_pairs(&self) -> &[(ClassroomId, ClassroomId)] {
        &self.records.adjacent
    }

    pub fn classroom(&self, id: ClassroomId) -> Option<&Classroom> {
        self.classroom_index
            .get(&id)
            .map(|&idx| &self.records.classrooms[idx])
    }

    pub fn lecturer(&self, id: LecturerId) -> Option<&Lecturer> {
        self.lecturer_index
            .get(&id)
            .map(|&idx| &self.records.lecturers[idx])
    }

    pub fn are_adjacent(&self, a: ClassroomId, b: ClassroomId) -> bool {
        self.adjacency.contains(&(a.min(b), a.max(b)))
    }

    /// Proximity between two classrooms, refined by declared adjacency.
    ///
    /// Unknown classrooms score as far apart.
    pub fn proximity(&self, a: ClassroomId, b: ClassroomId) -> u32 {
        let (Some(left), Some(right)) = (self.classroom(a), self.classroom(b)) else {
            return conflict::DIFFERENT_LOCATION;
        };
        let score = conflict::proximity_score(left, right);
        if score > conflict::ADJACENT && self.are_adjacent(a, b) {
            conflict::ADJACENT
        } else {
            score
        }
    }
}

impl From<ResourceRecords> for ResourceCatalogue {
    fn from(records: ResourceRecords) -> Self {
        let mut classroom_index = HashMap::new();
        for (idx, classroom) in records.classrooms.iter().enumerate() {
            classroom_index.entry(classroom.id).or_insert(idx);
        }
        let mut lecturer_index = HashMap::new();
        for (idx, lecturer) in records.lecturers.iter().enumerate() {
            lecturer_index.entry(lecturer.id).or_insert(idx);
        }
        let adjacency = records
            .adjacent
            .iter()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        Self {
            records,
            classroom_index,
            lecturer_index,
            adjacency,
        }
    }
}

impl From<ResourceCatalogue> for ResourceRecords {
    fn from(catalogue: ResourceCatalogue) -> Self {
        catalogue.records
    }
}

impl Serialize for ResourceCatalogue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceCatalogue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ResourceRecords::deserialize(deserializer).map(Self::from)
    }
}

/// Exams to place in one scheduling run.
#[derive(Debug, Clone, Default)]
pub struct DemandCatalogue {
    exams: Vec<Exam>,
    index: HashMap<ExamId, usize>,
}

impl DemandCatalogue {
    pub fn new(exams: Vec<Exam>) -> Self {
        Self::from(exams)
    }

    pub fn exams(&self) -> &[Exam] {
        &self.exams
    }

    pub fn exam(&self, id: ExamId) -> Option<&Exam> {
        self.index.get(&id).map(|&idx| &self.exams[idx])
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }
}

impl From<Vec<Exam>> for DemandCatalogue {
    fn from(exams: Vec<Exam>) -> Self {
        let mut index = HashMap::new();
        for (idx, exam) in exams.iter().enumerate() {
            index.entry(exam.id).or_insert(idx);
        }
        Self { exams, index }
    }
}

impl Serialize for DemandCatalogue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.exams.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DemandCatalogue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Exam>::deserialize(deserializer).map(Self::from)
    }
}

/// Read-only view over both catalogues of a run.
#[derive(Debug, Clone, Copy)]
pub struct Catalogues<'a> {
    pub resources: &'a ResourceCatalogue,
    pub demand: &'a DemandCatalogue,
}

impl<'a> Catalogues<'a> {
    pub fn new(resources: &'a ResourceCatalogue, demand: &'a DemandCatalogue) -> Self {
        Self { resources, demand }
    }
}
