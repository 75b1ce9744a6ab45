use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::ai::{AgentAiState, AiTimings, Transition};
use crate::config::TuningConfig;
use crate::constants::DEFAULT_TIME_LIMIT_MS;
use crate::events::EventQueue;
use crate::level::{Level, TileKind};
use crate::types::{
    Direction, GameOverReason, GameSummary, GhostMode, GhostView, PlayerView, RuntimeEvent,
    Snapshot, Vec2,
};

mod ai_system;
mod autopilot;
mod movement_system;
mod utils;

use self::utils::now_ms;

const INITIAL_GHOST_MODE: GhostMode = GhostMode::Chasing;

#[derive(Clone, Debug, Default)]
struct PlayerStats {
    ghosts_eaten: i32,
    lives_lost: i32,
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    view: PlayerView,
    desired_dir: Direction,
    move_buffer: f32,
    spawn: Vec2,
    stats: PlayerStats,
}

impl PlayerInternal {
    fn pos(&self) -> Vec2 {
        Vec2::new(self.view.x, self.view.y)
    }
}

#[derive(Clone, Debug)]
struct GhostInternal {
    id: String,
    pos: Vec2,
    dir: Direction,
    desired_dir: Direction,
    spawn: Vec2,
    move_buffer: f32,
    ai: AgentAiState,
}

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub tuning: TuningConfig,
    pub seed: u64,
    pub time_limit_ms: Option<u64>,
    pub autopilot: bool,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            tuning: TuningConfig::default(),
            seed: 0,
            time_limit_ms: None,
            autopilot: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub started_at_ms: u64,
    pub level: Level,

    tuning: TuningConfig,
    timings: AiTimings,
    rng: StdRng,
    player: PlayerInternal,
    ghosts: Vec<GhostInternal>,
    queue: EventQueue,
    events: Vec<RuntimeEvent>,
    autopilot: bool,

    time_limit_ms: u64,
    elapsed_ms: u64,
    ended: bool,
    end_reason: Option<GameOverReason>,
    tick_counter: u64,
    path_searches: u64,
}

impl GameEngine {
    pub fn new(level: Level, options: GameEngineOptions) -> Self {
        let spawn = level.player_spawn();
        let player = PlayerInternal {
            view: PlayerView {
                x: spawn.x,
                y: spawn.y,
                dir: Direction::None,
                lives: options.tuning.lives,
                score: 0,
                invulnerable: false,
                invulnerable_until: 0,
                speed_buff_until: 0,
            },
            desired_dir: Direction::None,
            move_buffer: 0.0,
            spawn,
            stats: PlayerStats::default(),
        };
        let ghosts = level
            .ghost_spawns()
            .iter()
            .enumerate()
            .map(|(idx, spawn)| GhostInternal {
                id: format!("ghost_{}", idx + 1),
                pos: *spawn,
                dir: Direction::None,
                desired_dir: Direction::None,
                spawn: *spawn,
                move_buffer: 0.0,
                ai: AgentAiState::new(INITIAL_GHOST_MODE),
            })
            .collect();

        Self {
            started_at_ms: now_ms(),
            level,
            timings: options.tuning.ai_timings(),
            tuning: options.tuning,
            rng: StdRng::seed_from_u64(options.seed),
            player,
            ghosts,
            queue: EventQueue::new(),
            events: Vec::new(),
            autopilot: options.autopilot,
            time_limit_ms: options.time_limit_ms.unwrap_or(DEFAULT_TIME_LIMIT_MS),
            elapsed_ms: 0,
            ended: false,
            end_reason: None,
            tick_counter: 0,
            path_searches: 0,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn end_reason(&self) -> Option<GameOverReason> {
        self.end_reason
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn now_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.elapsed_ms)
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    pub fn ghost_mode(&self, idx: usize) -> Option<GhostMode> {
        self.ghosts.get(idx).map(|ghost| ghost.ai.mode())
    }

    pub fn ghost_position(&self, idx: usize) -> Option<Vec2> {
        self.ghosts.get(idx).map(|ghost| ghost.pos)
    }

    pub fn ghost_desired_direction(&self, idx: usize) -> Option<Direction> {
        self.ghosts.get(idx).map(|ghost| ghost.desired_dir)
    }

    pub fn player_position(&self) -> Vec2 {
        self.player.pos()
    }

    pub fn set_player_direction(&mut self, dir: Direction) {
        self.player.desired_dir = dir;
    }

    /// Level-editor placement while the game runs. Paths computed against
    /// the old grid are replaced on the next frame.
    pub fn edit_tile(&mut self, pos: Vec2, kind: TileKind) -> bool {
        self.level.set_tile(pos, kind)
    }

    pub fn step(&mut self, dt_ms: u64) {
        if self.ended {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let now_ms = self.now_ms();

        let (mut player_before, mut ghosts_before) = self.positions();

        self.update_power(now_ms);
        self.update_player(dt_ms, now_ms);
        if self.resolve_collisions(player_before, &ghosts_before) {
            (player_before, ghosts_before) = self.positions();
        }
        self.update_ghost_modes(dt_ms);
        self.refresh_paths(now_ms);
        self.update_ghosts(dt_ms);
        self.resolve_collisions(player_before, &ghosts_before);
        self.dispatch_events(now_ms);
        self.check_game_over();
    }

    fn positions(&self) -> (Vec2, Vec<Vec2>) {
        (
            self.player.pos(),
            self.ghosts.iter().map(|ghost| ghost.pos).collect(),
        )
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.now_ms(),
            time_left_ms: self.time_limit_ms.saturating_sub(self.elapsed_ms),
            food_left: self.level.food_remaining(),
            player: self.player.view.clone(),
            ghosts: self
                .ghosts
                .iter()
                .map(|ghost| GhostView {
                    id: ghost.id.clone(),
                    x: ghost.pos.x,
                    y: ghost.pos.y,
                    dir: ghost.dir,
                    mode: ghost.ai.mode(),
                    mode_timer: ghost.ai.mode_timer(),
                    target: ghost.ai.target(),
                    path_len: ghost.ai.path().map(|path| path.len()).unwrap_or(0),
                })
                .collect(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.end_reason.unwrap_or(GameOverReason::Timeout),
            duration_ms: self.elapsed_ms,
            score: self.player.view.score,
            lives: self.player.view.lives,
            food_left: self.level.food_remaining(),
            ghosts_eaten: self.player.stats.ghosts_eaten,
            lives_lost: self.player.stats.lives_lost,
            path_searches: self.path_searches,
        }
    }

    fn record_transition(&mut self, ghost_idx: usize, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        self.events.push(RuntimeEvent::ModeChanged {
            ghost_id: self.ghosts[ghost_idx].id.clone(),
            from: transition.from,
            to: transition.to,
        });
    }

    fn check_game_over(&mut self) {
        let reason = if self.level.food_remaining() == 0 {
            Some(GameOverReason::Victory)
        } else if self.player.view.lives <= 0 {
            Some(GameOverReason::OutOfLives)
        } else if self.elapsed_ms >= self.time_limit_ms {
            Some(GameOverReason::Timeout)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.ended = true;
            self.end_reason = Some(reason);
            info!(
                ?reason,
                tick = self.tick_counter,
                score = self.player.view.score,
                "game over"
            );
        }
    }
}
