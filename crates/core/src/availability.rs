use std::collections::{HashMap, HashSet};

use types::{Slot, TeacherId};

use crate::entity_store::EntityStore;

/// Caches the teacher availability table as a set of *unavailable* slots, loaded once up
/// front. A teacher absent from the map is assumed available everywhere - the store only
/// needs to carry exceptions.
#[derive(Clone, Debug, Default)]
pub struct AvailabilityCache {
    unavailable: HashMap<TeacherId, HashSet<Slot>>,
}

impl AvailabilityCache {
    pub fn build(store: &dyn EntityStore) -> Self {
        let mut unavailable: HashMap<TeacherId, HashSet<Slot>> = HashMap::new();
        for a in store.availability() {
            if !a.available {
                unavailable
                    .entry(a.teacher_id.clone())
                    .or_default()
                    .insert(Slot::new(a.day, a.period));
            }
        }
        Self { unavailable }
    }

    pub fn is_available(&self, teacher_id: &TeacherId, slot: Slot) -> bool {
        !self
            .unavailable
            .get(teacher_id)
            .map(|s| s.contains(&slot))
            .unwrap_or(false)
    }

    /// Re-derives the unavailable set for one teacher from a fresh availability list, in case
    /// a caller is iterating on a single teacher's calendar without re-scanning the whole store.
    pub fn refresh_teacher(&mut self, teacher_id: &TeacherId, rows: impl Iterator<Item = (Slot, bool)>) {
        let entry = self.unavailable.entry(teacher_id.clone()).or_default();
        entry.clear();
        for (slot, available) in rows {
            if !available {
                entry.insert(slot);
            }
        }
    }
}
