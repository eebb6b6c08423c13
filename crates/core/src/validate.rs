use std::collections::HashSet;

use types::{ClassId, InputError, LessonId, RoomId, TeacherId};

use crate::entity_store::EntityStore;
use crate::error::ValidationError;

fn chk_unique<'a, I: Iterator<Item = &'a String>>(what: &'static str, ids: I, errors: &mut Vec<InputError>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(InputError::DuplicateId {
                what: what.to_string(),
                id: id.clone(),
            });
        }
    }
}

/// Structural validation of a store before any solver sees it: unique ids, in-bounds periods,
/// assignments that reference entities which actually exist, and curriculum coverage for every
/// assigned (lesson, grade) pair. Mirrors the up-front checks the source scheduler runs before
/// touching its database. Every check reports a structured `InputError` carrying the offending
/// id(s) (spec.md §7) rather than a free-form message, so a caller can act on `kind` directly.
pub fn validate(store: &dyn EntityStore) -> Result<(), ValidationError> {
    let mut errors: Vec<InputError> = Vec::new();

    chk_unique("class", store.classes().iter().map(|c| &c.class_id.0), &mut errors);
    chk_unique("teacher", store.teachers().iter().map(|t| &t.teacher_id.0), &mut errors);
    chk_unique("lesson", store.lessons().iter().map(|l| &l.lesson_id.0), &mut errors);
    chk_unique("room", store.classrooms().iter().map(|r| &r.room_id.0), &mut errors);

    let class_ids: HashSet<&ClassId> = store.classes().iter().map(|c| &c.class_id).collect();
    let teacher_ids: HashSet<&TeacherId> = store.teachers().iter().map(|t| &t.teacher_id).collect();
    let lesson_ids: HashSet<&LessonId> = store.lessons().iter().map(|l| &l.lesson_id).collect();
    let room_ids: HashSet<&RoomId> = store.classrooms().iter().map(|r| &r.room_id).collect();

    if room_ids.is_empty() {
        errors.push(InputError::Other { message: "no classrooms defined".into() });
    }

    let grade_by_class: std::collections::HashMap<&ClassId, u32> =
        store.classes().iter().map(|c| (&c.class_id, c.grade)).collect();

    for a in store.assignments() {
        if !class_ids.contains(&a.class_id) {
            errors.push(InputError::UnknownClass { class_id: a.class_id.clone() });
        }
        if !teacher_ids.contains(&a.teacher_id) {
            errors.push(InputError::UnknownTeacher {
                class_id: a.class_id.clone(),
                lesson_id: a.lesson_id.clone(),
                teacher_id: a.teacher_id.clone(),
            });
        }
        if !lesson_ids.contains(&a.lesson_id) {
            errors.push(InputError::UnknownLesson { lesson_id: a.lesson_id.clone() });
        }
        if let Some(&grade) = grade_by_class.get(&a.class_id) {
            let has_curriculum = store
                .curriculum()
                .iter()
                .any(|e| e.lesson_id == a.lesson_id && e.grade == grade && e.weekly_hours > 0);
            if !has_curriculum {
                errors.push(InputError::MissingCurriculum {
                    lesson_id: a.lesson_id.clone(),
                    grade,
                });
            }
        }
    }

    let periods_per_day = store.school_type().periods_per_day();
    for t in store.teachers() {
        for a in store.availability() {
            if a.teacher_id == t.teacher_id && a.period >= periods_per_day {
                errors.push(InputError::Other {
                    message: format!(
                        "teacher {} has an out-of-range period {} (school type allows 0..{periods_per_day})",
                        t.teacher_id, a.period
                    ),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_store::InMemoryStore;
    use types::{Assignment, Class, Lesson, SchoolType, Snapshot};

    fn store_with_assignment(teacher_id: &str) -> InMemoryStore {
        InMemoryStore::new(Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![Class {
                class_id: "c1".into(),
                name: "9A".into(),
                grade: 9,
                school_type: SchoolType::HighSchool,
            }],
            teachers: vec![],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: true,
                is_light_activity: false,
            }],
            classrooms: vec![types::Classroom {
                room_id: "r1".into(),
                name: "101".into(),
                capacity: 30,
            }],
            curriculum: vec![],
            assignments: vec![Assignment {
                class_id: "c1".into(),
                lesson_id: "math".into(),
                teacher_id: teacher_id.into(),
            }],
            availability: vec![],
        })
    }

    #[test]
    fn unknown_teacher_reference_is_reported_as_a_structured_input_error() {
        let store = store_with_assignment("ghost");
        let err = validate(&store).unwrap_err();
        assert!(err.errors().iter().any(|e| matches!(e, InputError::UnknownTeacher { teacher_id, .. } if teacher_id.0 == "ghost")));
    }
}
