use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::calendar::ExamPeriod;
use crate::data::{ExamType, TimeSlot};

pub const ADDR_ENV: &str = "EXAM_SCHEDULER_ADDR";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Which search drives a scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Most-constrained-first greedy placement with bounded backtracking.
    #[default]
    Greedy,
    /// Integer program solved by HiGHS; falls back to greedy if the solver fails.
    Exact,
}

/// Weights of the soft cost used to rank feasible candidates.
///
/// `capacity` multiplies the seats left empty, `proximity` the distance to
/// the cohort's other exams that day and `spread` the number of those exams.
/// Candidates with equal cost fall back to the raw distance, so by default
/// the smallest sufficient classroom wins and proximity only breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftWeights {
    pub capacity: f64,
    pub proximity: f64,
    pub spread: f64,
}

impl Default for SoftWeights {
    fn default() -> Self {
        Self {
            capacity: 1.0,
            proximity: 0.0,
            spread: 0.0,
        }
    }
}

/// Settings for one scheduling run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Explicit candidate slots.
    pub slots: Vec<TimeSlot>,
    /// Generates further slots from a date range and daily pattern.
    pub period: Option<ExamPeriod>,
    /// Exam types mapped to `false` are never scheduled; missing types are.
    pub required: BTreeMap<ExamType, bool>,
    /// Candidate trials the backtracking repair may spend over the whole run.
    pub backtrack_budget: usize,
    /// How many of the most recent placements a repair may undo.
    pub max_undo_depth: usize,
    pub weights: SoftWeights,
    /// Re-plan exams whose existing placement is only `planned`.
    pub revise_planned: bool,
    pub strategy: Strategy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            period: None,
            required: BTreeMap::new(),
            backtrack_budget: 256,
            max_undo_depth: 3,
            weights: SoftWeights::default(),
            revise_planned: true,
            strategy: Strategy::Greedy,
        }
    }
}

impl SolverConfig {
    pub fn with_slots(mut self, slots: Vec<TimeSlot>) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_period(mut self, period: ExamPeriod) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_backtrack_budget(mut self, budget: usize) -> Self {
        self.backtrack_budget = budget;
        self
    }

    pub fn with_max_undo_depth(mut self, depth: usize) -> Self {
        self.max_undo_depth = depth;
        self
    }

    pub fn with_weights(mut self, weights: SoftWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn keep_planned(mut self) -> Self {
        self.revise_planned = false;
        self
    }

    pub fn skip_exam_type(mut self, exam_type: ExamType) -> Self {
        self.required.insert(exam_type, false);
        self
    }

    pub fn requires(&self, exam_type: ExamType) -> bool {
        self.required.get(&exam_type).copied().unwrap_or(true)
    }

    /// Explicit and generated slots, sorted chronologically without duplicates.
    pub fn candidate_slots(&self) -> Vec<TimeSlot> {
        let mut slots = self.slots.clone();
        if let Some(period) = &self.period {
            slots.extend(period.slots());
        }
        slots.sort();
        slots.dedup();
        slots
    }
}

/// Settings for the HTTP shell, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        let raw = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, std::net::AddrParseError> {
        Ok(Self { addr: raw.trim().parse()? })
    }
}
