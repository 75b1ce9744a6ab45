use tracing::debug;

use super::utils::swapped;
use super::*;
use crate::constants::{
    FOOD_SCORE, GHOST_DEAD_SPEED_MULTIPLIER, GHOST_EAT_SCORE, GHOST_SCARED_SPEED_MULTIPLIER,
    PICKUP_SCORE, PLAYER_SPEED_BUFF_MULTIPLIER, SPEED_BUFF_DURATION_MS,
};
use crate::events::{EntityId, GameEvent};

impl GameEngine {
    pub(super) fn update_power(&mut self, now_ms: u64) {
        if self.player.view.invulnerable && now_ms >= self.player.view.invulnerable_until {
            self.player.view.invulnerable = false;
            self.queue
                .publish(GameEvent::InvulnerabilityChanged { active: false });
            debug!(now_ms, "invulnerability expired");
        }
    }

    pub(super) fn update_player(&mut self, dt_ms: u64, now_ms: u64) {
        if self.autopilot {
            self.player.desired_dir = self.autopilot_direction();
        }

        let mut speed = self.tuning.player_speed;
        if now_ms < self.player.view.speed_buff_until {
            speed *= PLAYER_SPEED_BUFF_MULTIPLIER;
        }
        self.player.move_buffer += speed * (dt_ms as f32 / 1000.0);

        while self.player.move_buffer >= 1.0 {
            let pos = self.player.pos();
            let dir = [self.player.desired_dir, self.player.view.dir]
                .into_iter()
                .find(|dir| *dir != Direction::None && self.level.is_walkable(pos.step(*dir)))
                .unwrap_or(Direction::None);
            if dir == Direction::None {
                self.player.view.dir = Direction::None;
                self.player.move_buffer = 0.0;
                break;
            }

            let next = pos.step(dir);
            self.player.move_buffer -= 1.0;
            self.player.view.x = next.x;
            self.player.view.y = next.y;
            self.player.view.dir = dir;
            self.queue.publish(GameEvent::EntityMoved {
                entity: EntityId::Player,
                dir,
                pos: next,
            });
            self.apply_pickup(next, now_ms);
        }
    }

    fn apply_pickup(&mut self, pos: Vec2, now_ms: u64) {
        let Some(kind) = self.level.take_pickup(pos) else {
            return;
        };
        let (x, y) = (pos.x, pos.y);
        match kind {
            TileKind::Food => {
                self.player.view.score += FOOD_SCORE;
                self.events.push(RuntimeEvent::FoodEaten { x, y });
            }
            TileKind::PowerUp => {
                self.player.view.score += PICKUP_SCORE;
                self.player.view.speed_buff_until = now_ms + SPEED_BUFF_DURATION_MS;
                self.events.push(RuntimeEvent::PowerUpTaken { x, y });
            }
            TileKind::GhostKiller => {
                self.player.view.score += PICKUP_SCORE;
                self.player.view.invulnerable = true;
                self.player.view.invulnerable_until = now_ms + self.tuning.power_duration_ms;
                self.events.push(RuntimeEvent::GhostKillerTaken { x, y });
                self.queue
                    .publish(GameEvent::InvulnerabilityChanged { active: true });
                debug!(x, y, until = self.player.view.invulnerable_until, "player invulnerable");
            }
            TileKind::Blank | TileKind::Wall | TileKind::Floor => {}
        }
    }

    /// Advances each ghost one path step per tile of movement budget.
    pub(super) fn update_ghosts(&mut self, dt_ms: u64) {
        let dt_secs = dt_ms as f32 / 1000.0;
        for ghost_idx in 0..self.ghosts.len() {
            let ghost = &mut self.ghosts[ghost_idx];
            ghost.move_buffer += self.tuning.ghost_speed * speed_multiplier(ghost.ai.mode()) * dt_secs;

            while ghost.move_buffer >= 1.0 {
                let dir = ghost.ai.next_direction();
                ghost.desired_dir = dir;
                if dir == Direction::None {
                    ghost.move_buffer = 1.0;
                    break;
                }
                let next = ghost.pos.step(dir);
                if !self.level.is_walkable(next) {
                    // Grid changed under the path.
                    ghost.ai.clear_path();
                    ghost.move_buffer = 1.0;
                    break;
                }

                ghost.move_buffer -= 1.0;
                ghost.pos = next;
                ghost.dir = dir;
                self.queue.publish(GameEvent::EntityMoved {
                    entity: EntityId::Ghost(ghost_idx),
                    dir,
                    pos: next,
                });
            }
        }
    }

    /// Returns true when the player lost a life and everyone went back to
    /// spawn.
    pub(super) fn resolve_collisions(&mut self, player_before: Vec2, ghosts_before: &[Vec2]) -> bool {
        let player_now = self.player.pos();
        for ghost_idx in 0..self.ghosts.len() {
            let ghost_now = self.ghosts[ghost_idx].pos;
            let ghost_before = ghosts_before.get(ghost_idx).copied().unwrap_or(ghost_now);
            let touching = ghost_now == player_now
                || swapped(player_before, player_now, ghost_before, ghost_now);
            if !touching {
                continue;
            }

            match self.ghosts[ghost_idx].ai.mode() {
                GhostMode::Dead => {}
                GhostMode::Scared => {
                    let transition = self.ghosts[ghost_idx].ai.on_player_contact();
                    self.record_transition(ghost_idx, transition);
                    self.player.view.score += GHOST_EAT_SCORE;
                    self.player.stats.ghosts_eaten += 1;
                    self.events.push(RuntimeEvent::GhostEaten {
                        ghost_id: self.ghosts[ghost_idx].id.clone(),
                    });
                }
                _ => {
                    self.lose_life();
                    return true;
                }
            }
        }
        false
    }

    fn lose_life(&mut self) {
        self.player.view.lives -= 1;
        self.player.stats.lives_lost += 1;
        self.events.push(RuntimeEvent::LifeLost {
            lives: self.player.view.lives,
        });
        info!(lives = self.player.view.lives, tick = self.tick_counter, "life lost");

        let spawn = self.player.spawn;
        let player = &mut self.player;
        player.view.x = spawn.x;
        player.view.y = spawn.y;
        player.view.dir = Direction::None;
        player.view.invulnerable = false;
        player.view.invulnerable_until = 0;
        player.view.speed_buff_until = 0;
        player.desired_dir = Direction::None;
        player.move_buffer = 0.0;

        // Messages from before the reset no longer apply; the end of
        // invulnerability is delivered directly instead.
        self.queue.clear();
        for ghost_idx in 0..self.ghosts.len() {
            let transition = self.ghosts[ghost_idx].ai.on_invulnerability_changed(false);
            self.record_transition(ghost_idx, transition);

            let ghost = &mut self.ghosts[ghost_idx];
            ghost.pos = ghost.spawn;
            ghost.dir = Direction::None;
            ghost.desired_dir = Direction::None;
            ghost.move_buffer = 0.0;
            ghost.ai.reset(INITIAL_GHOST_MODE);
        }
    }
}

fn speed_multiplier(mode: GhostMode) -> f32 {
    match mode {
        GhostMode::Scared => GHOST_SCARED_SPEED_MULTIPLIER,
        GhostMode::Dead => GHOST_DEAD_SPEED_MULTIPLIER,
        _ => 1.0,
    }
}
