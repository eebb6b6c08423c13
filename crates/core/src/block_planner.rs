/// Decomposes a weekly-hour requirement into an ordered list of block sizes. Pure, no I/O -
/// grounded in the branch table `enhanced_strict_scheduler.py` walks through for
/// `weekly_hours` 1..7 before falling back to a generalized rule for 8 and above.
///
/// The 2-hour case is load-bearing: a `required_hours == 2` Need must be placed as one
/// contiguous block or not at all (I7). `StrictPlacer` relies on `plan(2) == [2]` never
/// changing shape to decide whether the "any-slot"/"relaxed" fallbacks are even applicable.
pub struct BlockPlanner;

impl BlockPlanner {
    pub fn plan(required_hours: u32) -> Vec<u32> {
        match required_hours {
            0 => Vec::new(),
            1 => vec![1],
            2 => vec![2],
            3 => vec![2, 1],
            4 => vec![2, 2],
            5 => vec![2, 2, 1],
            6 => vec![2, 2, 2],
            7 => vec![2, 2, 2, 1],
            h => {
                let pairs = h / 2;
                let mut blocks = vec![2; pairs as usize];
                if h % 2 == 1 {
                    blocks.push(1);
                }
                blocks
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_canonical_table() {
        assert_eq!(BlockPlanner::plan(1), vec![1]);
        assert_eq!(BlockPlanner::plan(2), vec![2]);
        assert_eq!(BlockPlanner::plan(3), vec![2, 1]);
        assert_eq!(BlockPlanner::plan(4), vec![2, 2]);
        assert_eq!(BlockPlanner::plan(5), vec![2, 2, 1]);
        assert_eq!(BlockPlanner::plan(6), vec![2, 2, 2]);
        assert_eq!(BlockPlanner::plan(7), vec![2, 2, 2, 1]);
        assert_eq!(BlockPlanner::plan(8), vec![2, 2, 2, 2]);
        assert_eq!(BlockPlanner::plan(9), vec![2, 2, 2, 2, 1]);
    }

    #[test]
    fn round_trips_for_every_hour_count_up_to_twenty() {
        for h in 1..=20u32 {
            let blocks = BlockPlanner::plan(h);
            assert_eq!(blocks.iter().sum::<u32>(), h, "plan({h}) must sum back to {h}");
        }
    }

    #[test]
    fn two_hours_is_always_a_single_block_never_split() {
        assert_eq!(BlockPlanner::plan(2), vec![2]);
    }
}
