use tracing::trace;

use super::*;
use crate::ai::{AiContext, TargetContext};
use crate::events::{EntityId, GameEvent};

impl GameEngine {
    pub(super) fn update_ghost_modes(&mut self, dt_ms: u64) {
        let dt_secs = dt_ms as f32 / 1000.0;
        let player = self.player.pos();
        for ghost_idx in 0..self.ghosts.len() {
            let ghost = &mut self.ghosts[ghost_idx];
            let ctx = AiContext {
                position: ghost.pos,
                spawn: ghost.spawn,
                player,
                player_visible: self.level.line_of_sight(ghost.pos, player),
            };
            let transition = ghost.ai.update(dt_secs, &self.timings, &ctx);
            self.record_transition(ghost_idx, transition);
        }
    }

    /// Rebuilds every path that expired or was computed on an older grid.
    pub(super) fn refresh_paths(&mut self, now_ms: u64) {
        let version = self.level.version();
        for ghost_idx in 0..self.ghosts.len() {
            if self.ghosts[ghost_idx].ai.needs_new_path(version, now_ms) {
                self.replan(ghost_idx, now_ms);
            }
        }
    }

    pub(super) fn dispatch_events(&mut self, now_ms: u64) {
        for event in self.queue.drain() {
            match event {
                GameEvent::EntityMoved {
                    entity: EntityId::Ghost(ghost_idx),
                    ..
                } => {
                    if ghost_idx < self.ghosts.len() {
                        self.replan(ghost_idx, now_ms);
                    }
                }
                GameEvent::EntityMoved {
                    entity: EntityId::Player,
                    ..
                } => {}
                GameEvent::InvulnerabilityChanged { active } => {
                    for ghost_idx in 0..self.ghosts.len() {
                        let transition = self.ghosts[ghost_idx].ai.on_invulnerability_changed(active);
                        self.record_transition(ghost_idx, transition);
                    }
                }
            }
        }
    }

    fn replan(&mut self, ghost_idx: usize, now_ms: u64) {
        let ctx = self.target_context(ghost_idx);
        let ghost = &mut self.ghosts[ghost_idx];
        let path = ghost.ai.plan(
            &self.level,
            &ctx,
            self.tuning.algorithm,
            now_ms,
            self.tuning.path_ttl_ms,
        );
        trace!(
            ghost = %ghost.id,
            target = ?path.target(),
            steps = path.len(),
            "path planned"
        );
        self.path_searches += 1;
    }

    fn target_context(&self, ghost_idx: usize) -> TargetContext {
        let ghost = &self.ghosts[ghost_idx];
        let player = self.player.pos();
        TargetContext {
            agent: ghost.pos,
            heading: ghost.dir,
            spawn: ghost.spawn,
            player,
            player_heading: self.player.view.dir,
            player_last_seen: ghost.ai.last_seen_player().unwrap_or(player),
            previous_target: ghost.ai.target(),
        }
    }
}
