//! Simulated annealing over the soft score (spec.md §4.10), grounded in `local_search.py`'s
//! `SimulatedAnnealing` and `ScheduleNeighborGenerator`. Operates purely on a placement list
//! already satisfying the hard constraints; every candidate move is hard-constraint-checked
//! before it is ever scored, so a rejected move never touches `T`.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use sched_core::{AvailabilityCache, ConflictIndex, SoftConstraintScorer};
use types::{ClassId, Day, Lesson, LessonId, Placement, Slot, DAYS};

#[derive(Clone, Debug)]
pub struct AnnealerConfig {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub min_temperature: f64,
    pub iters_per_temp: u32,
    pub seed: u64,
}

impl Default for AnnealerConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.95,
            min_temperature: 1.0,
            iters_per_temp: 100,
            seed: 0,
        }
    }
}

pub struct AnnealResult {
    pub placements: Vec<Placement>,
    pub best_score: f64,
    pub iterations: u32,
}

struct Block {
    class_id: ClassId,
    lesson_id: LessonId,
    day: Day,
    indices: Vec<usize>,
}

pub struct Annealer;

impl Annealer {
    /// `deadline` is checked once per temperature step (spec.md §4's cancellation requirement
    /// applied to the annealer's own iteration boundary) - the best schedule observed so far is
    /// always what's returned, so a cancelled run still yields a usable result.
    pub fn run(
        placements: Vec<Placement>,
        lessons: &[Lesson],
        scorer: &SoftConstraintScorer,
        availability: &AvailabilityCache,
        enforce_room: bool,
        config: &AnnealerConfig,
        deadline: Option<Instant>,
    ) -> AnnealResult {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut current = placements;
        let mut current_score = scorer.score(&current, lessons).total;
        let mut best = current.clone();
        let mut best_score = current_score;

        let mut temperature = config.initial_temperature;
        let mut iterations = 0u32;

        while temperature >= config.min_temperature {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            for _ in 0..config.iters_per_temp {
                iterations += 1;
                let Some(candidate) = Self::neighbor(&current, &mut rng) else {
                    continue;
                };
                if !Self::hard_constraints_ok(&candidate, availability, enforce_room) {
                    continue;
                }

                let candidate_score = scorer.score(&candidate, lessons).total;
                let delta = candidate_score - current_score;
                let accept = delta >= 0.0 || rng.gen::<f64>() < (delta / temperature).exp();
                if accept {
                    current = candidate;
                    current_score = candidate_score;
                    if current_score > best_score {
                        best = current.clone();
                        best_score = current_score;
                    }
                }
            }
            temperature *= config.cooling_rate;
        }

        AnnealResult { placements: best, best_score, iterations }
    }

    /// Groups placements by `(class, lesson, day)`. I5/I7 guarantee each group is already one
    /// contiguous block, so a group *is* a block.
    fn blocks(placements: &[Placement]) -> Vec<Block> {
        let mut groups: HashMap<(ClassId, LessonId, Day), Vec<usize>> = HashMap::new();
        for (i, p) in placements.iter().enumerate() {
            groups.entry((p.class_id.clone(), p.lesson_id.clone(), p.day)).or_default().push(i);
        }
        groups
            .into_iter()
            .map(|((class_id, lesson_id, day), indices)| Block { class_id, lesson_id, day, indices })
            .collect()
    }

    fn neighbor(current: &[Placement], rng: &mut ChaCha8Rng) -> Option<Vec<Placement>> {
        let blocks = Self::blocks(current);
        if blocks.is_empty() {
            return None;
        }
        match rng.gen_range(0..3) {
            0 => Self::swap_blocks(current, &blocks, rng),
            1 => Self::move_block(current, &blocks, rng),
            _ => Self::swap_singletons(current, &blocks, rng),
        }
    }

    fn swap_blocks(current: &[Placement], blocks: &[Block], rng: &mut ChaCha8Rng) -> Option<Vec<Placement>> {
        if blocks.len() < 2 {
            return None;
        }
        let a = blocks.choose(rng)?;
        let others: Vec<&Block> = blocks
            .iter()
            .filter(|b| b.class_id != a.class_id || b.lesson_id != a.lesson_id)
            .collect();
        let b = *others.choose(rng)?;

        let mut next = current.to_vec();
        for &i in &a.indices {
            next[i].day = b.day;
        }
        for &i in &b.indices {
            next[i].day = a.day;
        }
        Some(next)
    }

    fn move_block(current: &[Placement], blocks: &[Block], rng: &mut ChaCha8Rng) -> Option<Vec<Placement>> {
        let b = blocks.choose(rng)?;
        let used_days: HashSet<Day> = blocks
            .iter()
            .filter(|x| x.class_id == b.class_id && x.lesson_id == b.lesson_id)
            .map(|x| x.day)
            .collect();
        let free_days: Vec<Day> = DAYS.iter().copied().filter(|d| !used_days.contains(d)).collect();
        let new_day = *free_days.choose(rng)?;

        let mut next = current.to_vec();
        for &i in &b.indices {
            next[i].day = new_day;
        }
        Some(next)
    }

    fn swap_singletons(current: &[Placement], blocks: &[Block], rng: &mut ChaCha8Rng) -> Option<Vec<Placement>> {
        let singles: Vec<&Block> = blocks.iter().filter(|b| b.indices.len() == 1).collect();
        if singles.len() < 2 {
            return None;
        }
        let a = *singles.choose(rng)?;
        let rest: Vec<&&Block> = singles.iter().filter(|x| x.indices[0] != a.indices[0]).collect();
        let b = **rest.choose(rng)?;

        let mut next = current.to_vec();
        let (ia, ib) = (a.indices[0], b.indices[0]);
        let (day_a, period_a) = (next[ia].day, next[ia].period);
        let (day_b, period_b) = (next[ib].day, next[ib].period);
        next[ia].day = day_b;
        next[ia].period = period_b;
        next[ib].day = day_a;
        next[ib].period = period_a;
        Some(next)
    }

    fn hard_constraints_ok(candidate: &[Placement], availability: &AvailabilityCache, enforce_room: bool) -> bool {
        if !ConflictIndex::check_all(candidate, enforce_room).is_empty() {
            return false;
        }
        for p in candidate {
            if !availability.is_available(&p.teacher_id, Slot::new(p.day, p.period)) {
                return false;
            }
        }
        let mut by_group: HashMap<(&ClassId, &LessonId, Day), Vec<u32>> = HashMap::new();
        for p in candidate {
            by_group.entry((&p.class_id, &p.lesson_id, p.day)).or_default().push(p.period);
        }
        for periods in by_group.values() {
            let mut sorted = periods.clone();
            sorted.sort_unstable();
            if sorted.windows(3).any(|w| w[0] + 1 == w[1] && w[1] + 1 == w[2]) {
                return false;
            }
        }
        true
    }
}
