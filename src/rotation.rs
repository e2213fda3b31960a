//! Day-by-day rotation schedule.
//!
//! Round 0 is a uniform shuffle of all region ids. Each later round is a
//! bounded shuffle of the previous one, re-drawn until it does not start
//! with the region the previous round ended on. The flattened rounds are
//! then laid onto consecutive calendar days.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::GenerationError;
use crate::shuffle::shuffle_slightly;

/// Date key format used by `date_list.json`.
pub const DATE_KEY_FORMAT: &str = "%Y%m%d";

/// Consecutive rounds, each a permutation of the same ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationSchedule {
    round_len: usize,
    ids: Vec<String>,
}

impl RotationSchedule {
    /// Flattened schedule, `rounds × N` ids long.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn round_len(&self) -> usize {
        self.round_len
    }

    pub fn round_count(&self) -> usize {
        if self.round_len == 0 {
            0
        } else {
            self.ids.len() / self.round_len
        }
    }

    pub fn rounds(&self) -> impl Iterator<Item = &[String]> {
        self.ids.chunks(self.round_len.max(1))
    }

    /// Lay the schedule onto consecutive days starting at `start`.
    pub fn assign_dates(&self, start: NaiveDate) -> Result<DateAssignment, GenerationError> {
        let mut entries = Vec::with_capacity(self.ids.len());
        let mut date = start;
        for (day, id) in self.ids.iter().enumerate() {
            if day > 0 {
                date = date
                    .succ_opt()
                    .ok_or(GenerationError::DateOverflow { days: day })?;
            }
            entries.push((date, id.clone()));
        }
        Ok(DateAssignment { entries })
    }
}

/// One region id per calendar day, contiguous and strictly increasing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateAssignment {
    entries: Vec<(NaiveDate, String)>,
}

impl DateAssignment {
    pub fn entries(&self) -> &[(NaiveDate, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.entries.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.entries.last().map(|(d, _)| *d)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&str> {
        let first = self.first_date()?;
        let offset = usize::try_from((date - first).num_days()).ok()?;
        self.entries.get(offset).map(|(_, id)| id.as_str())
    }

    /// `(YYYYMMDD, id)` pairs in date order.
    pub fn keyed(&self) -> impl Iterator<Item = (String, &str)> + Clone + '_ {
        self.entries
            .iter()
            .map(|(d, id)| (d.format(DATE_KEY_FORMAT).to_string(), id.as_str()))
    }
}

/// Builder for a [`RotationSchedule`] / [`DateAssignment`].
#[derive(Clone, Debug)]
pub struct RotationScheduleBuilder {
    rounds: usize,
    window: usize,
    max_retries: usize,
    seed: u64,
}

impl RotationScheduleBuilder {
    pub const DEFAULT_ROUNDS: usize = 10;
    pub const DEFAULT_WINDOW: usize = 10;
    pub const DEFAULT_MAX_RETRIES: usize = 1000;

    pub fn new(seed: u64) -> Self {
        Self {
            rounds: Self::DEFAULT_ROUNDS,
            window: Self::DEFAULT_WINDOW,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            seed,
        }
    }

    /// Number of full rounds in the schedule.
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Displacement window for each round-to-round shuffle.
    pub fn window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Shuffle attempts per round before giving up.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Generate the flat schedule for `ids`.
    pub fn schedule(&self, ids: &[String]) -> Result<RotationSchedule, GenerationError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.schedule_with_rng(ids, &mut rng)
    }

    /// Generate the schedule with a caller-owned random source.
    pub fn schedule_with_rng<R: Rng + ?Sized>(
        &self,
        ids: &[String],
        rng: &mut R,
    ) -> Result<RotationSchedule, GenerationError> {
        let n = ids.len();
        let mut flat: Vec<String> = Vec::with_capacity(n * self.rounds);

        if self.rounds > 0 {
            let mut round = ids.to_vec();
            round.shuffle(rng);
            flat.extend_from_slice(&round);

            for index in 1..self.rounds {
                round = self.next_round(&round, index, rng)?;
                flat.extend_from_slice(&round);
            }
        }

        info!(
            regions = n,
            rounds = self.rounds,
            window = self.window,
            days = flat.len(),
            "rotation schedule generated"
        );

        Ok(RotationSchedule {
            round_len: n,
            ids: flat,
        })
    }

    fn next_round<R: Rng + ?Sized>(
        &self,
        previous: &[String],
        index: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, GenerationError> {
        let Some(last) = previous.last() else {
            return Ok(Vec::new());
        };
        for attempt in 1..=self.max_retries {
            let candidate = shuffle_slightly(previous, self.window, rng);
            if candidate.first() != Some(last) {
                debug!(round = index, attempts = attempt, "round accepted");
                return Ok(candidate);
            }
        }
        Err(GenerationError::RetriesExhausted {
            round: index,
            attempts: self.max_retries,
        })
    }

    /// Generate the schedule and lay it onto days starting at `start`.
    pub fn build(&self, ids: &[String], start: NaiveDate) -> Result<DateAssignment, GenerationError> {
        self.schedule(ids)?.assign_dates(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:04}", i * 10 + 101)).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_three_regions_two_rounds() {
        let ids = ids(3);
        for seed in 0..50 {
            let schedule = RotationScheduleBuilder::new(seed)
                .rounds(2)
                .window(1)
                .schedule(&ids)
                .unwrap();

            assert_eq!(schedule.len(), 6);
            assert_ne!(schedule.ids()[3], schedule.ids()[2]);

            let expected: HashSet<&String> = ids.iter().collect();
            for round in schedule.rounds() {
                let got: HashSet<&String> = round.iter().collect();
                assert_eq!(round.len(), 3);
                assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn test_round_boundaries_never_repeat() {
        let ids = ids(99);
        let schedule = RotationScheduleBuilder::new(2024).schedule(&ids).unwrap();

        assert_eq!(schedule.round_count(), 10);
        assert_eq!(schedule.len(), 990);
        let rounds: Vec<&[String]> = schedule.rounds().collect();
        for pair in rounds.windows(2) {
            assert_ne!(pair[1][0], pair[0][pair[0].len() - 1]);
        }
    }

    #[test]
    fn test_rounds_stay_within_window_of_previous() {
        let ids = ids(40);
        let schedule = RotationScheduleBuilder::new(5)
            .rounds(6)
            .window(3)
            .schedule(&ids)
            .unwrap();
        let rounds: Vec<&[String]> = schedule.rounds().collect();
        for pair in rounds.windows(2) {
            let moved = crate::shuffle::max_displacement(pair[0], pair[1]).unwrap();
            assert!(moved <= 3);
        }
    }

    #[test]
    fn test_dates_are_contiguous() {
        let ids = ids(7);
        let start = date(2024, 2, 27);
        let assignment = RotationScheduleBuilder::new(1)
            .rounds(4)
            .window(2)
            .build(&ids, start)
            .unwrap();

        assert_eq!(assignment.len(), 28);
        assert_eq!(assignment.first_date(), Some(start));
        for pair in assignment.entries().windows(2) {
            assert_eq!(pair[0].0.succ_opt(), Some(pair[1].0));
        }

        let keys: Vec<String> = assignment.keyed().map(|(k, _)| k).collect();
        assert_eq!(keys[0], "20240227");
        assert_eq!(keys[2], "20240229");
        assert_eq!(keys[3], "20240301");
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(assignment.get(date(2024, 3, 1)), Some(assignment.entries()[3].1.as_str()));
    }

    #[test]
    fn test_seed_reproduces_schedule() {
        let ids = ids(25);
        let a = RotationScheduleBuilder::new(99).schedule(&ids).unwrap();
        let b = RotationScheduleBuilder::new(99).schedule(&ids).unwrap();
        let c = RotationScheduleBuilder::new(100).schedule(&ids).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_single_region_exhausts_retries() {
        let err = RotationScheduleBuilder::new(0)
            .rounds(2)
            .max_retries(5)
            .schedule(&ids(1))
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::RetriesExhausted {
                round: 1,
                attempts: 5
            }
        );
    }

    #[test]
    fn test_single_round_single_region_is_fine() {
        let schedule = RotationScheduleBuilder::new(0)
            .rounds(1)
            .schedule(&ids(1))
            .unwrap();
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn test_empty_universe() {
        let assignment = RotationScheduleBuilder::new(0)
            .build(&[], date(2025, 1, 1))
            .unwrap();
        assert!(assignment.is_empty());
        assert_eq!(assignment.first_date(), None);
    }

    #[test]
    fn test_calendar_overflow_is_reported() {
        let err = RotationScheduleBuilder::new(0)
            .rounds(1)
            .build(&ids(3), NaiveDate::MAX)
            .unwrap_err();
        assert_eq!(err, GenerationError::DateOverflow { days: 1 });
    }
}
