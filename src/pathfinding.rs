use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::constants::PATH_TTL_MS;
use crate::level::Level;
use crate::types::{Direction, Vec2};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchAlgorithm {
    #[serde(rename = "bfs")]
    BreadthFirst,
    #[default]
    #[serde(rename = "astar", alias = "a*")]
    AStar,
}

impl SearchAlgorithm {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bfs" => Some(Self::BreadthFirst),
            "astar" | "a*" => Some(Self::AStar),
            _ => None,
        }
    }
}

/// Shortest route from `origin` to `target`, as a stack of steps: the last
/// element is the first move to make. Empty when the target is unreachable,
/// equal to the origin, or either end is out of bounds.
pub fn find_path(
    level: &Level,
    origin: Vec2,
    target: Vec2,
    algorithm: SearchAlgorithm,
) -> Vec<Direction> {
    match algorithm {
        SearchAlgorithm::BreadthFirst => bfs(level, origin, target),
        SearchAlgorithm::AStar => astar(level, origin, target),
    }
}

pub fn bfs(level: &Level, origin: Vec2, target: Vec2) -> Vec<Direction> {
    if origin == target || !level.in_bounds(origin) || !level.in_bounds(target) {
        return Vec::new();
    }

    let mut came_from = HashMap::from([(origin, origin)]);
    let mut frontier = VecDeque::from([origin]);
    while let Some(current) = frontier.pop_front() {
        if current == target {
            break;
        }
        for next in level.neighbors(current) {
            if came_from.contains_key(&next) {
                continue;
            }
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }

    trace!(?origin, ?target, visited = came_from.len(), "bfs finished");
    traceback(&came_from, origin, target)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrontierNode {
    priority: i32,
    pos: Vec2,
}

// Min-heap on priority; equal priorities pop the lowest row, then the
// lowest column.
impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.pos.y.cmp(&self.pos.y))
            .then_with(|| other.pos.x.cmp(&self.pos.x))
    }
}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* with a Manhattan heuristic; every edge costs 1.
pub fn astar(level: &Level, origin: Vec2, target: Vec2) -> Vec<Direction> {
    if origin == target || !level.in_bounds(origin) || !level.in_bounds(target) {
        return Vec::new();
    }

    let mut came_from = HashMap::from([(origin, origin)]);
    let mut cost_so_far = HashMap::from([(origin, 0)]);
    let mut frontier = BinaryHeap::from([FrontierNode {
        priority: origin.manhattan(target),
        pos: origin,
    }]);

    while let Some(FrontierNode { priority, pos: current }) = frontier.pop() {
        if current == target {
            break;
        }
        let Some(&current_cost) = cost_so_far.get(&current) else {
            continue;
        };
        if priority > current_cost + current.manhattan(target) {
            // superseded by a cheaper entry
            continue;
        }
        for next in level.neighbors(current) {
            let new_cost = current_cost + 1;
            if cost_so_far
                .get(&next)
                .is_some_and(|&known| new_cost >= known)
            {
                continue;
            }
            cost_so_far.insert(next, new_cost);
            came_from.insert(next, current);
            frontier.push(FrontierNode {
                priority: new_cost + next.manhattan(target),
                pos: next,
            });
        }
    }

    trace!(?origin, ?target, visited = came_from.len(), "astar finished");
    traceback(&came_from, origin, target)
}

fn traceback(came_from: &HashMap<Vec2, Vec2>, origin: Vec2, target: Vec2) -> Vec<Direction> {
    if !came_from.contains_key(&target) {
        return Vec::new();
    }
    let mut steps = Vec::new();
    let mut current = target;
    while current != origin {
        let Some(&previous) = came_from.get(&current) else {
            return Vec::new();
        };
        steps.push(Direction::from_delta(
            current.x - previous.x,
            current.y - previous.y,
        ));
        current = previous;
    }
    steps
}

/// One search result, consumed a step at a time.
#[derive(Clone, Debug)]
pub struct Path {
    steps: Vec<Direction>,
    target: Vec2,
    created_at_ms: u64,
    grid_version: u64,
    ttl_ms: u64,
}

impl Path {
    pub fn new(steps: Vec<Direction>, target: Vec2, created_at_ms: u64, grid_version: u64) -> Self {
        Self {
            steps,
            target,
            created_at_ms,
            grid_version,
            ttl_ms: PATH_TTL_MS,
        }
    }

    pub fn search(
        level: &Level,
        origin: Vec2,
        target: Vec2,
        algorithm: SearchAlgorithm,
        now_ms: u64,
    ) -> Self {
        let steps = find_path(level, origin, target, algorithm);
        Self::new(steps, target, now_ms, level.version())
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Pops the next move. An exhausted path yields `Direction::None`.
    pub fn get(&mut self) -> Direction {
        self.steps.pop().unwrap_or(Direction::None)
    }

    pub fn peek(&self) -> Direction {
        self.steps.last().copied().unwrap_or(Direction::None)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn outdated(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) >= self.ttl_ms
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn grid_version(&self) -> u64 {
        self.grid_version
    }

    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.steps.iter().rev().copied()
    }
}
