//! Bounded-displacement shuffle.
//!
//! A single left-to-right pass moves every item at most `amount` slots away
//! from where it started. The result is deliberately not a uniform random
//! permutation: it keeps consecutive rotation rounds similar in order while
//! still varying them.
//!
//! A slot `s` can only receive items from input positions `s - amount ..= s + amount`,
//! so when item `i` is placed, slot `i - amount` is on its last chance. Filling it
//! whenever it is free keeps every slot below `i - amount + 1` occupied after step
//! `i`, which leaves at least one free candidate for every later item.

use rand::Rng;

/// Permute `items` so that no item moves more than `amount` positions.
///
/// `amount == 0` returns the input unchanged. Windows wider than the slice are
/// clipped to its bounds.
pub fn shuffle_slightly<T: Clone, R: Rng + ?Sized>(items: &[T], amount: usize, rng: &mut R) -> Vec<T> {
    slot_assignment(items.len(), amount, rng)
        .into_iter()
        .map(|from| items[from].clone())
        .collect()
}

/// Output slot -> input index mapping for a bounded shuffle of `len` items.
pub fn slot_assignment<R: Rng + ?Sized>(len: usize, amount: usize, rng: &mut R) -> Vec<usize> {
    let mut slots: Vec<Option<usize>> = vec![None; len];
    let mut candidates = Vec::with_capacity(amount.saturating_mul(2).saturating_add(1).min(len));

    for i in 0..len {
        let lo = i.saturating_sub(amount);
        let hi = i.saturating_add(amount).min(len - 1);

        candidates.clear();
        candidates.extend((lo..=hi).filter(|&s| slots[s].is_none()));
        debug_assert!(!candidates.is_empty(), "no free slot for item {}", i);

        let target = match candidates.as_slice() {
            [only] => *only,
            // Slot i - amount cannot be reached by any later item.
            [first, ..] if i >= amount && *first == i - amount => *first,
            _ => candidates[rng.gen_range(0..candidates.len())],
        };
        slots[target] = Some(i);
    }

    slots.into_iter().flatten().collect()
}

/// Largest distance any item moved between `before` and `after`.
///
/// Items are matched by equality, so both slices should hold distinct values.
#[cfg(test)]
pub(crate) fn max_displacement<T: PartialEq>(before: &[T], after: &[T]) -> Option<usize> {
    after
        .iter()
        .enumerate()
        .map(|(new, item)| {
            before
                .iter()
                .position(|x| x == item)
                .map(|old| old.abs_diff(new))
        })
        .try_fold(0, |max, d| d.map(|d| max.max(d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn is_permutation(input: &[u32], output: &[u32]) -> bool {
        let mut a = input.to_vec();
        let mut b = output.to_vec();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    #[test]
    fn test_window_one_on_five_items() {
        let items = [1, 2, 3, 4, 5];
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = shuffle_slightly(&items, 1, &mut rng);

            assert!(is_permutation(&items, &out));
            assert!(max_displacement(&items, &out).unwrap() <= 1);

            let first = out.iter().position(|&x| x == 1).unwrap();
            let last = out.iter().position(|&x| x == 5).unwrap();
            assert!(first <= 1);
            assert!(last >= 3);
        }
    }

    #[test]
    fn test_permutation_and_bound_across_windows() {
        // Includes windows at and beyond the sequence length.
        for len in 0..24usize {
            let items: Vec<u32> = (0..len as u32).collect();
            for amount in 0..(len + 3) {
                for seed in 0..20 {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed * 1000 + amount as u64);
                    let out = shuffle_slightly(&items, amount, &mut rng);
                    assert_eq!(out.len(), items.len());
                    assert!(is_permutation(&items, &out), "len {} amount {}", len, amount);
                    assert!(
                        max_displacement(&items, &out).unwrap() <= amount,
                        "len {} amount {}",
                        len,
                        amount
                    );
                }
            }
        }
    }

    #[test]
    fn test_zero_window_is_identity() {
        let items: Vec<u32> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(shuffle_slightly(&items, 0, &mut rng), items);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let items: Vec<u32> = (0..99).collect();
        let a = shuffle_slightly(&items, 10, &mut ChaCha8Rng::seed_from_u64(42));
        let b = shuffle_slightly(&items, 10, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_actually_moves_items() {
        let items: Vec<u32> = (0..99).collect();
        let moved = (0..10).any(|seed| {
            shuffle_slightly(&items, 10, &mut ChaCha8Rng::seed_from_u64(seed)) != items
        });
        assert!(moved);
    }

    #[test]
    fn test_max_displacement_detects_foreign_items() {
        assert_eq!(max_displacement(&[1, 2, 3], &[3, 2, 1]), Some(2));
        assert_eq!(max_displacement(&[1, 2, 3], &[1, 2, 4]), None);
    }
}
