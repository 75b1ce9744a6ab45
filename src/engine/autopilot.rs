use super::utils::{nearest_tile, random_direction};
use super::*;
use crate::constants::AUTOPILOT_DANGER_DISTANCE;
use crate::pathfinding::bfs;

impl GameEngine {
    /// Headless player steering: hunt scared ghosts while invulnerable, run
    /// for a ghost killer (or away) when threatened, otherwise eat the
    /// nearest food.
    pub(super) fn autopilot_direction(&mut self) -> Direction {
        let pos = self.player.pos();

        if self.player.view.invulnerable {
            let prey: Vec<Vec2> = self
                .ghosts
                .iter()
                .filter(|ghost| ghost.ai.mode() == GhostMode::Scared)
                .map(|ghost| ghost.pos)
                .collect();
            if let Some(dir) = self.first_step_to(pos, |tile| prey.contains(&tile)) {
                return dir;
            }
        }

        let threats: Vec<Vec2> = self
            .ghosts
            .iter()
            .filter(|ghost| !matches!(ghost.ai.mode(), GhostMode::Scared | GhostMode::Dead))
            .map(|ghost| ghost.pos)
            .filter(|ghost_pos| ghost_pos.manhattan(pos) <= AUTOPILOT_DANGER_DISTANCE)
            .collect();
        if !threats.is_empty() {
            let killer = self.first_step_to(pos, |tile| {
                self.level.tile(tile) == Some(TileKind::GhostKiller)
            });
            if let Some(dir) = killer.or_else(|| self.escape_direction(pos, &threats)) {
                return dir;
            }
        }

        if let Some(dir) =
            self.first_step_to(pos, |tile| self.level.tile(tile) == Some(TileKind::Food))
        {
            return dir;
        }
        self.wander(pos)
    }

    fn first_step_to(&self, pos: Vec2, accept: impl Fn(Vec2) -> bool) -> Option<Direction> {
        let goal = nearest_tile(&self.level, pos, accept)?;
        bfs(&self.level, pos, goal).last().copied()
    }

    fn escape_direction(&self, pos: Vec2, threats: &[Vec2]) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|dir| self.level.is_walkable(pos.step(*dir)))
            .map(|dir| {
                let next = pos.step(dir);
                let gap = threats
                    .iter()
                    .map(|threat| threat.manhattan(next))
                    .min()
                    .unwrap_or(i32::MAX);
                (dir, gap)
            })
            .fold(None, |best: Option<(Direction, i32)>, (dir, gap)| match best {
                Some((_, best_gap)) if best_gap >= gap => best,
                _ => Some((dir, gap)),
            })
            .map(|(dir, _)| dir)
    }

    /// Walkable neighbor scanned from a random starting heading.
    fn wander(&mut self, pos: Vec2) -> Direction {
        let first = random_direction(&mut self.rng);
        let start = Direction::ALL
            .iter()
            .position(|dir| *dir == first)
            .unwrap_or(0);
        (0..Direction::ALL.len())
            .map(|offset| Direction::ALL[(start + offset) % Direction::ALL.len()])
            .find(|dir| self.level.is_walkable(pos.step(*dir)))
            .unwrap_or(Direction::None)
    }
}
