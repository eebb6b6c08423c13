use types::{Day, Period, RoomId};

use crate::conflict::ConflictIndex;
use crate::entity_store::EntityStore;

/// Picks a room for a placement about to be committed at `(day, period)`. Every placer needs
/// one regardless of `room_policy` - `Placement.room_id` is never a dummy value when one can be
/// assigned without violating I3 (spec.md §4.7 / SPEC_FULL §4, grounded in
/// `enhanced_strict_scheduler.py`'s `_find_available_classroom`).
///
/// When room enforcement (I3) is on, returns the first classroom (in store order) not already
/// occupying that slot in `index`, or `None` if every classroom is occupied - the caller must
/// treat that exactly like any other unplaceable slot, never fall back to a conflicting room.
/// When off, deterministically returns the first classroom. `validate()` already rejects stores
/// with no classrooms, so an empty list here is a caller bug.
pub fn pick_room(store: &dyn EntityStore, index: &ConflictIndex, day: Day, period: Period) -> Option<RoomId> {
    let rooms = store.classrooms();
    if rooms.is_empty() {
        return None;
    }
    if !index.enforce_room() {
        return Some(rooms[0].room_id.clone());
    }
    rooms
        .iter()
        .find(|r| !index.room_conflict(&r.room_id, day, period))
        .map(|r| r.room_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_store::InMemoryStore;
    use types::{Classroom, SchoolType, Snapshot};

    fn store(rooms: Vec<Classroom>) -> InMemoryStore {
        InMemoryStore::new(Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![],
            teachers: vec![],
            lessons: vec![],
            classrooms: rooms,
            curriculum: vec![],
            assignments: vec![],
            availability: vec![],
        })
    }

    #[test]
    fn ignore_policy_always_returns_first_room() {
        let s = store(vec![
            Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 },
            Classroom { room_id: "r2".into(), name: "102".into(), capacity: 30 },
        ]);
        let idx = ConflictIndex::new(false);
        assert_eq!(pick_room(&s, &idx, Day::Mon, 0), Some("r1".into()));
    }

    #[test]
    fn enforce_policy_skips_occupied_room() {
        let s = store(vec![
            Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 },
            Classroom { room_id: "r2".into(), name: "102".into(), capacity: 30 },
        ]);
        let mut idx = ConflictIndex::new(true);
        idx.commit(&types::Placement {
            class_id: "c1".into(),
            teacher_id: "t1".into(),
            lesson_id: "math".into(),
            room_id: "r1".into(),
            day: Day::Mon,
            period: 0,
        });
        assert_eq!(pick_room(&s, &idx, Day::Mon, 0), Some("r2".into()));
    }

    #[test]
    fn enforce_policy_returns_none_when_every_room_is_occupied() {
        let s = store(vec![
            Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 },
            Classroom { room_id: "r2".into(), name: "102".into(), capacity: 30 },
        ]);
        let mut idx = ConflictIndex::new(true);
        for (class_id, room_id) in [("c1", "r1"), ("c2", "r2")] {
            idx.commit(&types::Placement {
                class_id: class_id.into(),
                teacher_id: "t1".into(),
                lesson_id: "math".into(),
                room_id: room_id.into(),
                day: Day::Mon,
                period: 0,
            });
        }
        assert_eq!(pick_room(&s, &idx, Day::Mon, 0), None);
    }
}
