use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Hash, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(ClassId);
id_newtype!(TeacherId);
id_newtype!(LessonId);
id_newtype!(RoomId);

/// Day of the instructional week. Only Monday-Friday are modeled (`day` domain is `{0..4}`).
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Hash, Ord, PartialOrd,
)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

pub const DAYS: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

impl Day {
    pub fn index(self) -> usize {
        match self {
            Day::Mon => 0,
            Day::Tue => 1,
            Day::Wed => 2,
            Day::Thu => 3,
            Day::Fri => 4,
        }
    }

    pub fn from_index(i: usize) -> Option<Day> {
        DAYS.get(i).copied()
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
        };
        f.write_str(s)
    }
}

/// One (day, period) cell in the weekly grid. Periods are 0-indexed.
pub type Period = u32;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Hash, Ord, PartialOrd,
)]
pub struct Slot {
    pub day: Day,
    pub period: Period,
}

impl Slot {
    pub fn new(day: Day, period: Period) -> Self {
        Self { day, period }
    }
}

/// School type drives periods-per-day.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SchoolType {
    Elementary,
    Middle,
    HighSchool,
    AnatolianHigh,
    ScienceHigh,
    SocialScienceHigh,
}

impl SchoolType {
    pub fn periods_per_day(self) -> u32 {
        match self {
            SchoolType::Elementary | SchoolType::Middle => 7,
            SchoolType::HighSchool
            | SchoolType::AnatolianHigh
            | SchoolType::ScienceHigh
            | SchoolType::SocialScienceHigh => 8,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Class {
    pub class_id: ClassId,
    pub name: String,
    pub grade: u32,
    pub school_type: SchoolType,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Teacher {
    pub teacher_id: TeacherId,
    pub name: String,
    pub subject: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Lesson {
    pub lesson_id: LessonId,
    pub name: String,
    pub school_type: SchoolType,
    /// Favors morning periods heavily in soft scoring (e.g. maths, sciences).
    #[serde(default)]
    pub is_difficult: bool,
    /// Favors lunch-adjacent periods in soft scoring (e.g. PE, music, electives).
    #[serde(default)]
    pub is_light_activity: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Classroom {
    pub room_id: RoomId,
    pub name: String,
    pub capacity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct CurriculumEntry {
    pub lesson_id: LessonId,
    pub grade: u32,
    pub weekly_hours: u32,
}

/// Declares which teacher teaches which lesson to which class. Never invented by the scheduler.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Assignment {
    pub class_id: ClassId,
    pub lesson_id: LessonId,
    pub teacher_id: TeacherId,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Availability {
    pub teacher_id: TeacherId,
    pub day: Day,
    pub period: Period,
    pub available: bool,
}

/// One atomic output record.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, PartialEq, Eq, Hash)]
pub struct Placement {
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub lesson_id: LessonId,
    pub room_id: RoomId,
    pub day: Day,
    pub period: Period,
}

/// One `(class, lesson)` together with its required weekly hours - the scheduler's unit of work.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, PartialEq, Eq, Hash)]
pub struct Need {
    pub class_id: ClassId,
    pub lesson_id: LessonId,
    pub teacher_id: TeacherId,
    pub required_hours: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Simple,
    Hybrid,
    CspFull,
    Annealed,
    Parallel,
    Auto,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BacktrackBudget {
    Auto,
    Fixed { limit: u32 },
}

impl Default for BacktrackBudget {
    fn default() -> Self {
        BacktrackBudget::Auto
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RelaxationPolicy {
    Strict,
    AllowAfterIters { iters: u32 },
}

impl Default for RelaxationPolicy {
    fn default() -> Self {
        RelaxationPolicy::Strict
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum RoomPolicy {
    Ignore,
    Enforce,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        RoomPolicy::Ignore
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct RunConfig {
    pub strategy: Strategy,
    #[serde(default = "default_wall_time")]
    pub max_wall_time_secs: u64,
    #[serde(default)]
    pub backtrack_budget: BacktrackBudget,
    #[serde(default)]
    pub relaxation_policy: RelaxationPolicy,
    #[serde(default)]
    pub room_policy: RoomPolicy,
    #[serde(default)]
    pub seed: u64,
}

fn default_wall_time() -> u64 {
    30
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            max_wall_time_secs: default_wall_time(),
            backtrack_budget: BacktrackBudget::Auto,
            relaxation_policy: RelaxationPolicy::Strict,
            room_policy: RoomPolicy::Ignore,
            seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    Class,
    Teacher,
    Room,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub placements: Vec<Placement>,
}

/// Reason codes recorded by the explainer, mirroring the source scheduler's failure taxonomy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    TeacherUnavailable,
    NoSlots,
    TeacherConflict,
    ClassConflict,
    DomainExhausted,
    ConstraintViolation,
    BacktrackLimit,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Failure {
    pub class_id: ClassId,
    pub lesson_id: LessonId,
    pub teacher_id: TeacherId,
    pub required_hours: u32,
    pub scheduled_hours: u32,
    pub reason: FailureReason,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Default)]
pub struct ExplainReport {
    pub failures: Vec<Failure>,
    pub reason_counts: std::collections::BTreeMap<String, u64>,
    pub critical_issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleStatus {
    Complete,
    Partial,
    Infeasible,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct ScheduleResult {
    pub status: ScheduleStatus,
    pub placements: Vec<Placement>,
    pub conflicts: Vec<Conflict>,
    pub score: f64,
    pub coverage_pct: f64,
    pub strategy_used: Strategy,
    pub explain: ExplainReport,
    pub stats: serde_json::Value,
}

/// A full read-only snapshot of the entities an entity-store would otherwise serve one call
/// at a time. Used as the wire payload for `/v1/solve` and to back the in-memory store used
/// by tests.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct Snapshot {
    pub school_type: SchoolType,
    pub classes: Vec<Class>,
    pub teachers: Vec<Teacher>,
    pub lessons: Vec<Lesson>,
    pub classrooms: Vec<Classroom>,
    pub curriculum: Vec<CurriculumEntry>,
    pub assignments: Vec<Assignment>,
    pub availability: Vec<Availability>,
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct SolveRequest {
    pub snapshot: Snapshot,
    pub config: RunConfig,
}

/// A named, persisted weighting of constraint priorities.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema, Eq, PartialEq, Ord, PartialOrd, Hash,
)]
#[repr(u8)]
pub enum ConstraintPriority {
    Optional = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl ConstraintPriority {
    pub fn penalty(self) -> f64 {
        match self {
            ConstraintPriority::Critical => 1000.0,
            ConstraintPriority::High => 100.0,
            ConstraintPriority::Medium => 10.0,
            ConstraintPriority::Low => 1.0,
            ConstraintPriority::Optional => 0.1,
        }
    }

    pub fn scoring_weight(self) -> f64 {
        match self {
            ConstraintPriority::Critical => 100.0,
            ConstraintPriority::High => 50.0,
            ConstraintPriority::Medium => 20.0,
            ConstraintPriority::Low => 5.0,
            ConstraintPriority::Optional => 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema, JsonSchema)]
pub struct PriorityProfile {
    pub profile_name: String,
    pub priorities: std::collections::BTreeMap<String, ConstraintPriority>,
}

/// Structured per-id input errors (spec.md §7's "input errors - caller bug" category).
/// `core::validate` collects these rather than building ad-hoc strings, so a caller can act on
/// `kind`/ids directly instead of parsing prose.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema, JsonSchema, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InputError {
    #[error("assignment references unknown teacher {teacher_id} for class {class_id}/lesson {lesson_id}")]
    UnknownTeacher {
        class_id: ClassId,
        lesson_id: LessonId,
        teacher_id: TeacherId,
    },
    #[error("assignment references unknown class {class_id}")]
    UnknownClass { class_id: ClassId },
    #[error("assignment references unknown lesson {lesson_id}")]
    UnknownLesson { lesson_id: LessonId },
    #[error("no curriculum hours for lesson {lesson_id} at grade {grade}")]
    MissingCurriculum { lesson_id: LessonId, grade: u32 },
    #[error("duplicate {what} id: {id}")]
    DuplicateId { what: String, id: String },
    /// Store-level problems with no natural id to carry (e.g. no classrooms at all).
    #[error("{message}")]
    Other { message: String },
}
