use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::Rng;

use crate::level::Level;
use crate::types::{Direction, Vec2};

pub(super) fn now_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    now as u64
}

pub(super) fn random_direction(rng: &mut StdRng) -> Direction {
    match rng.random_range(0..4) {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

/// Closest walkable tile (by steps) satisfying `accept`, excluding `origin`.
pub(super) fn nearest_tile(
    level: &Level,
    origin: Vec2,
    accept: impl Fn(Vec2) -> bool,
) -> Option<Vec2> {
    let mut seen = HashSet::from([origin]);
    let mut queue = VecDeque::from([origin]);
    while let Some(pos) = queue.pop_front() {
        if pos != origin && accept(pos) {
            return Some(pos);
        }
        for next in level.neighbors(pos) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    None
}

/// True when two movers exchanged tiles during the same frame.
pub(super) fn swapped(a_before: Vec2, a_now: Vec2, b_before: Vec2, b_now: Vec2) -> bool {
    a_before == b_now && b_before == a_now && a_before != a_now
}
