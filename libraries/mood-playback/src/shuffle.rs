//! Random selection for shuffled playback

use rand::seq::SliceRandom;
use rand::Rng;

/// Index of the next track to play from a queue of `len` tracks
///
/// Uniform over the whole queue; `None` when it is empty.
pub fn pick_index<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Option<usize> {
    (len > 0).then(|| rng.gen_range(0..len))
}

/// Fisher-Yates shuffle in place
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_pick_index_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_index(0, &mut rng), None);
        for _ in 0..100 {
            assert!(pick_index(5, &mut rng).unwrap() < 5);
        }
    }

    #[test]
    fn test_pick_index_reaches_every_slot() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<usize> = (0..200).filter_map(|_| pick_index(4, &mut rng)).collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_shuffle_keeps_items() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut items: Vec<u32> = (0..50).collect();
        shuffle_in_place(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
