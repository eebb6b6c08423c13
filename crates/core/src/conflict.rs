use std::collections::{HashMap, HashSet};

use crate::error::IndexError;
use types::{ClassId, Conflict, ConflictKind, Placement, RoomId, Slot, TeacherId};

/// O(1) keyed-set occupancy index over the three axes that must never collide: one class,
/// one teacher, and (when room enforcement is on) one room can hold at most one placement
/// per slot. Placers mutate this incrementally through `try_place`/`remove` rather than
/// rescanning the placement list, so it stays valid across thousands of backtracking steps.
#[derive(Clone, Debug, Default)]
pub struct ConflictIndex {
    class_occ: HashSet<(ClassId, Slot)>,
    teacher_occ: HashSet<(TeacherId, Slot)>,
    room_occ: HashSet<(RoomId, Slot)>,
    enforce_room: bool,
}

impl ConflictIndex {
    pub fn new(enforce_room: bool) -> Self {
        Self {
            enforce_room,
            ..Default::default()
        }
    }

    /// Which axes (if any) a placement would collide on, without mutating the index.
    pub fn conflicts_for(&self, p: &Placement) -> Vec<ConflictKind> {
        let slot = Slot::new(p.day, p.period);
        let mut kinds = Vec::new();
        if self.class_occ.contains(&(p.class_id.clone(), slot)) {
            kinds.push(ConflictKind::Class);
        }
        if self.teacher_occ.contains(&(p.teacher_id.clone(), slot)) {
            kinds.push(ConflictKind::Teacher);
        }
        if self.enforce_room && self.room_occ.contains(&(p.room_id.clone(), slot)) {
            kinds.push(ConflictKind::Room);
        }
        kinds
    }

    pub fn is_free(&self, p: &Placement) -> bool {
        self.conflicts_for(p).is_empty()
    }

    /// Whether `room_id` is already occupied at `(day, period)`. Always `false` when room
    /// enforcement is off - callers that only want a deterministic pick needn't special-case it.
    pub fn room_conflict(&self, room_id: &RoomId, day: types::Day, period: types::Period) -> bool {
        self.enforce_room && self.room_occ.contains(&(room_id.clone(), Slot::new(day, period)))
    }

    pub fn enforce_room(&self) -> bool {
        self.enforce_room
    }

    /// Commits the placement if it is conflict-free; returns false without mutating otherwise.
    pub fn try_place(&mut self, p: &Placement) -> bool {
        if !self.is_free(p) {
            return false;
        }
        self.commit(p);
        true
    }

    pub fn commit(&mut self, p: &Placement) {
        let slot = Slot::new(p.day, p.period);
        self.class_occ.insert((p.class_id.clone(), slot));
        self.teacher_occ.insert((p.teacher_id.clone(), slot));
        if self.enforce_room {
            self.room_occ.insert((p.room_id.clone(), slot));
        }
    }

    /// Undoes a `commit`. Per spec.md §4.2, fails with `IndexDesync` if `p` is not present on
    /// an enforced axis - that is always a placer bug, never a condition callers route around.
    pub fn remove(&mut self, p: &Placement) -> Result<(), IndexError> {
        let slot = Slot::new(p.day, p.period);
        if !self.class_occ.remove(&(p.class_id.clone(), slot)) {
            return Err(IndexError::IndexDesync {
                axis: "class",
                id: p.class_id.to_string(),
                day: p.day,
                period: p.period,
            });
        }
        if !self.teacher_occ.remove(&(p.teacher_id.clone(), slot)) {
            return Err(IndexError::IndexDesync {
                axis: "teacher",
                id: p.teacher_id.to_string(),
                day: p.day,
                period: p.period,
            });
        }
        if self.enforce_room && !self.room_occ.remove(&(p.room_id.clone(), slot)) {
            return Err(IndexError::IndexDesync {
                axis: "room",
                id: p.room_id.to_string(),
                day: p.day,
                period: p.period,
            });
        }
        Ok(())
    }

    /// Full re-validation of a placement list independent of incremental state - the last
    /// line of defense before a result is returned to the caller.
    pub fn check_all(placements: &[Placement], enforce_room: bool) -> Vec<Conflict> {
        let mut by_class: HashMap<(ClassId, Slot), Vec<Placement>> = HashMap::new();
        let mut by_teacher: HashMap<(TeacherId, Slot), Vec<Placement>> = HashMap::new();
        let mut by_room: HashMap<(RoomId, Slot), Vec<Placement>> = HashMap::new();

        for p in placements {
            let slot = Slot::new(p.day, p.period);
            by_class.entry((p.class_id.clone(), slot)).or_default().push(p.clone());
            by_teacher
                .entry((p.teacher_id.clone(), slot))
                .or_default()
                .push(p.clone());
            if enforce_room {
                by_room.entry((p.room_id.clone(), slot)).or_default().push(p.clone());
            }
        }

        let mut conflicts = Vec::new();
        for group in by_class.into_values() {
            if group.len() > 1 {
                conflicts.push(Conflict {
                    kind: ConflictKind::Class,
                    placements: group,
                });
            }
        }
        for group in by_teacher.into_values() {
            if group.len() > 1 {
                conflicts.push(Conflict {
                    kind: ConflictKind::Teacher,
                    placements: group,
                });
            }
        }
        for group in by_room.into_values() {
            if group.len() > 1 {
                conflicts.push(Conflict {
                    kind: ConflictKind::Room,
                    placements: group,
                });
            }
        }
        conflicts
    }

    /// Indices (in list order) of every placement that should be dropped to reduce `placements`
    /// to one placement per group `check_all` finds conflicting - keeping the first of each group.
    /// Shared by `dedupe_conflicts` below and `AggressiveFiller::remove_duplicate_conflicts`,
    /// which additionally has to unwind each drop through `ConflictIndex::remove`.
    pub fn conflicting_indices(placements: &[Placement], enforce_room: bool) -> HashSet<usize> {
        let conflicts = Self::check_all(placements, enforce_room);
        let mut drop = HashSet::new();
        for conflict in &conflicts {
            for (rank, p) in conflict.placements.iter().enumerate() {
                if rank == 0 {
                    continue;
                }
                if let Some(pos) = placements.iter().position(|q| q == p) {
                    drop.insert(pos);
                }
            }
        }
        drop
    }

    /// Drops every placement but the first in each conflicting group `check_all` finds, returning
    /// how many were dropped. `StrictPlacer` and `CSPEngine` only check `ConflictKind::Class`/
    /// `Teacher` before committing a block (their probe placements carry no real `room_id` yet),
    /// relying on `pick_room` to avoid a room that is already occupied rather than refusing to
    /// commit when none is free - so this is the backstop that keeps a genuine I3 violation from
    /// ever reaching a final `ScheduleResult` for those two strategies.
    pub fn dedupe_conflicts(placements: &mut Vec<Placement>, enforce_room: bool) -> usize {
        let drop = Self::conflicting_indices(placements, enforce_room);
        if drop.is_empty() {
            return 0;
        }
        let mut i = 0;
        placements.retain(|_| {
            let keep = !drop.contains(&i);
            i += 1;
            keep
        });
        drop.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Day;

    fn p(class: &str, teacher: &str, room: &str, day: Day, period: u32) -> Placement {
        Placement {
            class_id: class.into(),
            teacher_id: teacher.into(),
            lesson_id: "math".into(),
            room_id: room.into(),
            day,
            period,
        }
    }

    #[test]
    fn detects_teacher_double_booking() {
        let mut idx = ConflictIndex::new(false);
        assert!(idx.try_place(&p("c1", "t1", "r1", Day::Mon, 0)));
        assert!(!idx.try_place(&p("c2", "t1", "r1", Day::Mon, 0)));
    }

    #[test]
    fn remove_frees_the_slot() {
        let mut idx = ConflictIndex::new(false);
        let a = p("c1", "t1", "r1", Day::Mon, 0);
        idx.commit(&a);
        idx.remove(&a).unwrap();
        assert!(idx.try_place(&p("c2", "t1", "r1", Day::Mon, 0)));
    }

    #[test]
    fn remove_on_a_never_committed_placement_reports_desync() {
        let mut idx = ConflictIndex::new(false);
        let err = idx.remove(&p("c1", "t1", "r1", Day::Mon, 0)).unwrap_err();
        assert!(matches!(err, IndexError::IndexDesync { axis: "class", .. }));
    }

    #[test]
    fn check_all_finds_class_conflicts() {
        let placements = vec![
            p("c1", "t1", "r1", Day::Mon, 0),
            p("c1", "t2", "r2", Day::Mon, 0),
        ];
        let conflicts = ConflictIndex::check_all(&placements, false);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Class);
    }

    #[test]
    fn dedupe_conflicts_keeps_the_first_of_each_room_conflict_and_drops_the_rest() {
        let mut placements = vec![
            p("c1", "t1", "r1", Day::Mon, 0),
            p("c2", "t2", "r1", Day::Mon, 0),
        ];
        let dropped = ConflictIndex::dedupe_conflicts(&mut placements, true);
        assert_eq!(dropped, 1);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].class_id, "c1".into());
        assert!(ConflictIndex::check_all(&placements, true).is_empty());
    }

    #[test]
    fn dedupe_conflicts_is_a_no_op_when_nothing_conflicts() {
        let mut placements = vec![p("c1", "t1", "r1", Day::Mon, 0), p("c2", "t2", "r2", Day::Mon, 0)];
        let dropped = ConflictIndex::dedupe_conflicts(&mut placements, true);
        assert_eq!(dropped, 0);
        assert_eq!(placements.len(), 2);
    }
}
