//! Live queue-board state: waiting count and per-chair status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Occupancy of a single chair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChairStatus {
    #[default]
    Available,
    Occupied,
}

impl ChairStatus {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Available => Self::Occupied,
            Self::Occupied => Self::Available,
        }
    }

    #[must_use]
    pub const fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied)
    }
}

/// The in-memory board: how many people are waiting and which chairs are
/// taken. Chairs are numbered from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardState {
    pub waiting_customers: u32,
    /// Keyed by chair number; serialized with string keys like the legacy
    /// `chairStates` object.
    pub chairs: BTreeMap<u32, ChairStatus>,
}

impl BoardState {
    /// Build a board with `chair_count` available chairs and nobody waiting.
    #[must_use]
    pub fn with_chairs(chair_count: u32) -> Self {
        let mut board = Self::default();
        board.resize_chairs(chair_count);
        board
    }

    /// Grow or shrink the chair map to exactly `1..=chair_count`, keeping
    /// the status of chairs that survive.
    pub fn resize_chairs(&mut self, chair_count: u32) {
        self.chairs.retain(|&chair, _| chair >= 1 && chair <= chair_count);
        for chair in 1..=chair_count {
            self.chairs.entry(chair).or_default();
        }
    }

    /// Flip one chair between available and occupied.
    ///
    /// Returns the new status, or `None` for an unknown chair number.
    pub fn toggle_chair(&mut self, chair: u32) -> Option<ChairStatus> {
        let status = self.chairs.get_mut(&chair)?;
        *status = status.toggled();
        Some(*status)
    }

    /// Empty the queue and free every chair, keeping the chair count.
    pub fn reset(&mut self) {
        self.waiting_customers = 0;
        for status in self.chairs.values_mut() {
            *status = ChairStatus::Available;
        }
    }

    /// Move the waiting count by `delta`, clamped to `0..=max_waiting`.
    /// Returns the new count.
    pub fn adjust_waiting(&mut self, delta: i32, max_waiting: u32) -> u32 {
        let current = i64::from(self.waiting_customers);
        let next = (current + i64::from(delta)).clamp(0, i64::from(max_waiting));
        // clamp keeps the value in u32 range
        self.waiting_customers = u32::try_from(next).unwrap_or(0);
        self.waiting_customers
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.chairs.values().filter(|status| status.is_occupied()).count()
    }

    /// True when the board has chairs and every one is occupied.
    #[must_use]
    pub fn all_occupied(&self) -> bool {
        !self.chairs.is_empty() && self.chairs.values().all(|status| status.is_occupied())
    }

    /// Capture the board with a timestamp, for local persistence.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> BoardSnapshot {
        BoardSnapshot {
            waiting_customers: self.waiting_customers,
            chairs: self.chairs.clone(),
            timestamp: now.timestamp_millis(),
        }
    }

    /// Restore from a snapshot, discarding the timestamp.
    pub fn restore(&mut self, snapshot: BoardSnapshot) {
        self.waiting_customers = snapshot.waiting_customers;
        self.chairs = snapshot.chairs;
    }
}

/// A board state stamped for persistence. Stale snapshots (older than
/// [`BoardSnapshot::MAX_AGE_MS`]) are dropped on load rather than restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub waiting_customers: u32,
    pub chairs: BTreeMap<u32, ChairStatus>,
    /// Capture time in Unix milliseconds.
    pub timestamp: i64,
}

impl BoardSnapshot {
    /// Snapshots older than a day are discarded on load.
    pub const MAX_AGE_MS: i64 = 24 * 60 * 60 * 1000;

    /// Whether the snapshot is recent enough to restore at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp < Self::MAX_AGE_MS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_with_chairs_numbers_from_one() {
        let board = BoardState::with_chairs(3);
        assert_eq!(board.chairs.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(board.chairs.values().all(|s| !s.is_occupied()));
    }

    #[test]
    fn test_resize_preserves_surviving_chairs() {
        let mut board = BoardState::with_chairs(4);
        board.toggle_chair(2).unwrap();

        board.resize_chairs(2);
        assert_eq!(board.chairs.len(), 2);
        assert_eq!(board.chairs[&2], ChairStatus::Occupied);

        board.resize_chairs(5);
        assert_eq!(board.chairs.len(), 5);
        assert_eq!(board.chairs[&2], ChairStatus::Occupied);
        assert_eq!(board.chairs[&5], ChairStatus::Available);
    }

    #[test]
    fn test_toggle_unknown_chair_is_none() {
        let mut board = BoardState::with_chairs(1);
        assert!(board.toggle_chair(9).is_none());
    }

    #[test]
    fn test_toggle_flips_both_ways() {
        let mut board = BoardState::with_chairs(1);
        assert_eq!(board.toggle_chair(1), Some(ChairStatus::Occupied));
        assert_eq!(board.toggle_chair(1), Some(ChairStatus::Available));
    }

    #[test]
    fn test_reset_frees_chairs_and_empties_queue() {
        let mut board = BoardState::with_chairs(2);
        board.toggle_chair(1).unwrap();
        board.adjust_waiting(3, 20);

        board.reset();
        assert_eq!(board.waiting_customers, 0);
        assert_eq!(board.chairs.len(), 2);
        assert_eq!(board.occupied_count(), 0);
    }

    #[test]
    fn test_waiting_clamps_at_both_ends() {
        let mut board = BoardState::default();
        assert_eq!(board.adjust_waiting(-1, 20), 0);
        assert_eq!(board.adjust_waiting(3, 20), 3);
        assert_eq!(board.adjust_waiting(100, 20), 20);
        assert_eq!(board.adjust_waiting(-100, 20), 0);
    }

    #[test]
    fn test_all_occupied_requires_chairs() {
        let mut board = BoardState::default();
        assert!(!board.all_occupied());

        board.resize_chairs(2);
        board.toggle_chair(1).unwrap();
        assert!(!board.all_occupied());
        board.toggle_chair(2).unwrap();
        assert!(board.all_occupied());
        assert_eq!(board.occupied_count(), 2);
    }

    #[test]
    fn test_snapshot_ttl() {
        let now = Utc::now();
        let board = BoardState::with_chairs(1);
        let snapshot = board.snapshot(now);

        assert!(snapshot.is_fresh(now));
        assert!(snapshot.is_fresh(now + TimeDelta::hours(23)));
        assert!(!snapshot.is_fresh(now + TimeDelta::hours(25)));
    }

    #[test]
    fn test_restore_roundtrip() {
        let mut board = BoardState::with_chairs(2);
        board.toggle_chair(1).unwrap();
        board.adjust_waiting(4, 20);

        let snapshot = board.snapshot(Utc::now());
        let mut restored = BoardState::default();
        restored.restore(snapshot);
        assert_eq!(restored, board);
    }

    #[test]
    fn test_serde_uses_string_chair_keys() {
        let mut board = BoardState::with_chairs(2);
        board.toggle_chair(2).unwrap();
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "waitingCustomers": 0,
                "chairs": {"1": "available", "2": "occupied"},
            })
        );
    }
}
