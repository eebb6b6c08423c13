use types::{Assignment, Availability, Class, Classroom, CurriculumEntry, Lesson, SchoolType, Snapshot, Teacher};

/// The read contract the scheduling modules hold against whatever owns the underlying data.
/// A thin trait rather than a concrete struct so the API layer can back it with a snapshot
/// taken per request while tests can back it with fixtures built by hand.
pub trait EntityStore: Send + Sync {
    fn school_type(&self) -> SchoolType;
    fn classes(&self) -> &[Class];
    fn teachers(&self) -> &[Teacher];
    fn lessons(&self) -> &[Lesson];
    fn classrooms(&self) -> &[Classroom];
    fn curriculum(&self) -> &[CurriculumEntry];
    fn assignments(&self) -> &[Assignment];
    fn availability(&self) -> &[Availability];
}

/// In-memory `EntityStore` backed by a `Snapshot`. What the API hands the orchestrator after
/// deserializing a request body, and what tests construct directly.
pub struct InMemoryStore {
    snapshot: Snapshot,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl EntityStore for InMemoryStore {
    fn school_type(&self) -> SchoolType {
        self.snapshot.school_type
    }
    fn classes(&self) -> &[Class] {
        &self.snapshot.classes
    }
    fn teachers(&self) -> &[Teacher] {
        &self.snapshot.teachers
    }
    fn lessons(&self) -> &[Lesson] {
        &self.snapshot.lessons
    }
    fn classrooms(&self) -> &[Classroom] {
        &self.snapshot.classrooms
    }
    fn curriculum(&self) -> &[CurriculumEntry] {
        &self.snapshot.curriculum
    }
    fn assignments(&self) -> &[Assignment] {
        &self.snapshot.assignments
    }
    fn availability(&self) -> &[Availability] {
        &self.snapshot.availability
    }
}
