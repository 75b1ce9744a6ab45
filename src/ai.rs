use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::constants::{CHASE_AHEAD_TILES, CHASE_TIME_SECS, SCARED_SEARCH_RADIUS, SCATTER_TIME_SECS};
use crate::level::Level;
use crate::pathfinding::{Path, SearchAlgorithm};
use crate::types::{Direction, GhostMode, Vec2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AiTimings {
    pub chase_secs: f32,
    pub scatter_secs: f32,
}

impl Default for AiTimings {
    fn default() -> Self {
        Self {
            chase_secs: CHASE_TIME_SECS,
            scatter_secs: SCATTER_TIME_SECS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: GhostMode,
    pub to: GhostMode,
}

#[derive(Clone, Copy, Debug)]
pub struct AiContext {
    pub position: Vec2,
    pub spawn: Vec2,
    pub player: Vec2,
    pub player_visible: bool,
}

/// Inputs to target selection. `previous_target` only breaks ties.
#[derive(Clone, Copy, Debug)]
pub struct TargetContext {
    pub agent: Vec2,
    pub heading: Direction,
    pub spawn: Vec2,
    pub player: Vec2,
    pub player_heading: Direction,
    pub player_last_seen: Vec2,
    pub previous_target: Option<Vec2>,
}

#[derive(Clone, Debug)]
pub struct AgentAiState {
    mode: GhostMode,
    mode_timer: f32,
    target: Option<Vec2>,
    path: Option<Path>,
    last_seen_player: Option<Vec2>,
    scatter_heading: Option<Direction>,
}

impl AgentAiState {
    pub fn new(mode: GhostMode) -> Self {
        Self {
            mode,
            mode_timer: 0.0,
            target: None,
            path: None,
            last_seen_player: None,
            scatter_heading: None,
        }
    }

    pub fn mode(&self) -> GhostMode {
        self.mode
    }

    pub fn mode_timer(&self) -> f32 {
        self.mode_timer
    }

    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn last_seen_player(&self) -> Option<Vec2> {
        self.last_seen_player
    }

    pub fn set_mode(&mut self, mode: GhostMode) -> Option<Transition> {
        if self.mode == mode {
            return None;
        }
        let transition = Transition {
            from: self.mode,
            to: mode,
        };
        self.mode = mode;
        self.mode_timer = 0.0;
        self.target = None;
        self.path = None;
        self.scatter_heading = None;
        debug!(from = ?transition.from, to = ?transition.to, "ghost mode changed");
        Some(transition)
    }

    pub fn update(
        &mut self,
        dt_secs: f32,
        timings: &AiTimings,
        ctx: &AiContext,
    ) -> Option<Transition> {
        self.mode_timer += dt_secs;
        if ctx.player_visible {
            self.last_seen_player = Some(ctx.player);
        }

        match self.mode {
            GhostMode::Chasing if self.mode_timer > timings.chase_secs => {
                self.set_mode(GhostMode::Scattering)
            }
            GhostMode::Scattering if self.mode_timer > timings.scatter_secs => {
                self.set_mode(GhostMode::Searching)
            }
            GhostMode::Searching if ctx.player_visible => self.set_mode(GhostMode::Chasing),
            GhostMode::Dead if ctx.position == ctx.spawn => self.set_mode(GhostMode::Searching),
            _ => None,
        }
    }

    pub fn on_invulnerability_changed(&mut self, active: bool) -> Option<Transition> {
        match (active, self.mode) {
            (true, GhostMode::Dead) => None,
            (true, _) => self.set_mode(GhostMode::Scared),
            (false, GhostMode::Scared) => self.set_mode(GhostMode::Searching),
            (false, _) => None,
        }
    }

    pub fn on_player_contact(&mut self) -> Option<Transition> {
        if self.mode == GhostMode::Scared {
            return self.set_mode(GhostMode::Dead);
        }
        None
    }

    pub fn needs_new_path(&self, level_version: u64, now_ms: u64) -> bool {
        match &self.path {
            None => true,
            Some(path) => path.outdated(now_ms) || path.grid_version() != level_version,
        }
    }

    /// Re-runs the current mode's target rule and searches a fresh path.
    pub fn plan(
        &mut self,
        level: &Level,
        ctx: &TargetContext,
        algorithm: SearchAlgorithm,
        now_ms: u64,
        ttl_ms: u64,
    ) -> &Path {
        let mut ctx = *ctx;
        ctx.previous_target = self.target;
        // "Behind" is measured from the heading at scatter entry.
        if self.mode == GhostMode::Scattering {
            ctx.heading = *self.scatter_heading.get_or_insert(ctx.heading);
        }

        let target = select_target(level, self.mode, &ctx);
        self.target = Some(target);
        self.path
            .insert(Path::search(level, ctx.agent, target, algorithm, now_ms).with_ttl(ttl_ms))
    }

    pub fn next_direction(&mut self) -> Direction {
        self.path
            .as_mut()
            .map(Path::get)
            .unwrap_or(Direction::None)
    }

    pub fn clear_path(&mut self) {
        self.path = None;
    }

    pub fn reset(&mut self, mode: GhostMode) {
        *self = Self::new(mode);
    }
}

pub fn select_target(level: &Level, mode: GhostMode, ctx: &TargetContext) -> Vec2 {
    match mode {
        GhostMode::Chasing => ctx.player,
        GhostMode::ChasingAhead => ahead_of_player(level, ctx),
        GhostMode::Scattering => scatter_target(level, ctx),
        GhostMode::Searching => search_target(level, ctx),
        GhostMode::Scared => escape_target(level, ctx),
        GhostMode::Dead => ctx.spawn,
    }
}

fn ahead_of_player(level: &Level, ctx: &TargetContext) -> Vec2 {
    let mut pos = ctx.player;
    for _ in 0..CHASE_AHEAD_TILES {
        let next = pos.step(ctx.player_heading);
        if next == pos || !level.is_walkable(next) {
            break;
        }
        pos = next;
    }
    pos
}

fn reachable(level: &Level, origin: Vec2, limit: Option<usize>) -> Vec<(Vec2, usize)> {
    let mut dist = HashMap::from([(origin, 0usize)]);
    let mut queue = VecDeque::from([origin]);
    let mut order = vec![(origin, 0usize)];
    while let Some(pos) = queue.pop_front() {
        let d = dist[&pos];
        if limit.is_some_and(|limit| d >= limit) {
            continue;
        }
        for next in level.neighbors(pos) {
            if dist.contains_key(&next) {
                continue;
            }
            dist.insert(next, d + 1);
            order.push((next, d + 1));
            queue.push_back(next);
        }
    }
    order
}

fn heading_dot(from: Vec2, to: Vec2, heading: Direction) -> i32 {
    let (hx, hy) = heading.delta();
    (to.x - from.x) * hx + (to.y - from.y) * hy
}

/// Closest intersection behind the agent; any closest intersection when
/// nothing lies behind.
fn scatter_target(level: &Level, ctx: &TargetContext) -> Vec2 {
    let intersections: Vec<(Vec2, usize)> = reachable(level, ctx.agent, None)
        .into_iter()
        .filter(|(pos, _)| *pos != ctx.agent && level.is_intersection(*pos))
        .collect();
    let preference = |(pos, steps): &&(Vec2, usize)| (*steps, Some(*pos) != ctx.previous_target);
    intersections
        .iter()
        .filter(|(pos, _)| {
            ctx.heading == Direction::None || heading_dot(ctx.agent, *pos, ctx.heading) < 0
        })
        .min_by_key(preference)
        .or_else(|| intersections.iter().min_by_key(preference))
        .map(|(pos, _)| *pos)
        .unwrap_or(ctx.agent)
}

fn search_target(level: &Level, ctx: &TargetContext) -> Vec2 {
    let focus = ctx.player_last_seen;
    reachable(level, ctx.agent, None)
        .into_iter()
        .filter(|(pos, _)| *pos != ctx.agent && *pos != ctx.player && level.is_intersection(*pos))
        .min_by_key(|(pos, steps)| {
            let behind = heading_dot(ctx.agent, *pos, ctx.heading) < 0;
            let fresh = Some(*pos) != ctx.previous_target;
            (pos.manhattan(focus), behind, fresh, *steps, pos.y, pos.x)
        })
        .map(|(pos, _)| pos)
        .unwrap_or(ctx.agent)
}

// Unreachable-from-player tiles rank as infinitely far.
fn escape_target(level: &Level, ctx: &TargetContext) -> Vec2 {
    let from_player: HashMap<Vec2, usize> =
        reachable(level, ctx.player, None).into_iter().collect();
    reachable(level, ctx.agent, Some(SCARED_SEARCH_RADIUS))
        .into_iter()
        .filter(|(pos, _)| *pos != ctx.agent)
        .max_by_key(|(pos, steps)| {
            let player_steps = from_player.get(pos).copied().unwrap_or(usize::MAX);
            let ahead = heading_dot(ctx.agent, *pos, ctx.heading) > 0;
            (
                player_steps,
                Some(*pos) == ctx.previous_target,
                ahead,
                std::cmp::Reverse(*steps),
                std::cmp::Reverse((pos.y, pos.x)),
            )
        })
        .map(|(pos, _)| pos)
        .unwrap_or(ctx.agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.001;

    fn ctx_at(position: Vec2) -> AiContext {
        AiContext {
            position,
            spawn: Vec2::new(9, 9),
            player: Vec2::new(9, 15),
            player_visible: false,
        }
    }

    fn target_ctx(level: &Level, agent: Vec2, heading: Direction) -> TargetContext {
        let player = level.player_spawn();
        TargetContext {
            agent,
            heading,
            spawn: level.ghost_spawns()[0],
            player,
            player_heading: Direction::Left,
            player_last_seen: player,
            previous_target: None,
        }
    }

    fn state_in(mode: GhostMode, timer: f32) -> AgentAiState {
        let mut state = AgentAiState::new(mode);
        state.mode_timer = timer;
        state
    }

    #[test]
    fn chase_expires_into_scatter() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Chasing, CHASE_TIME_SECS + EPSILON);
        let transition = state.update(0.0, &timings, &ctx_at(Vec2::new(1, 1)));
        assert_eq!(
            transition,
            Some(Transition {
                from: GhostMode::Chasing,
                to: GhostMode::Scattering
            })
        );
        assert_eq!(state.mode(), GhostMode::Scattering);
        assert_eq!(state.mode_timer(), 0.0);
    }

    #[test]
    fn chase_holds_until_limit_is_exceeded() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Chasing, 0.0);
        for _ in 0..20 {
            assert_eq!(state.update(1.0, &timings, &ctx_at(Vec2::new(1, 1))), None);
        }
        assert_eq!(state.mode(), GhostMode::Chasing);
        assert!(state.update(0.5, &timings, &ctx_at(Vec2::new(1, 1))).is_some());
        assert_eq!(state.mode(), GhostMode::Scattering);
    }

    #[test]
    fn scatter_expires_into_search() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Scattering, SCATTER_TIME_SECS - 0.5);
        assert_eq!(state.update(0.25, &timings, &ctx_at(Vec2::new(1, 1))), None);
        state.update(0.5, &timings, &ctx_at(Vec2::new(1, 1)));
        assert_eq!(state.mode(), GhostMode::Searching);
        assert_eq!(state.mode_timer(), 0.0);
    }

    #[test]
    fn search_switches_to_chase_on_sight() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Searching, 3.0);
        assert_eq!(state.update(0.1, &timings, &ctx_at(Vec2::new(1, 1))), None);

        let mut seen = ctx_at(Vec2::new(9, 13));
        seen.player_visible = true;
        state.update(0.1, &timings, &seen);
        assert_eq!(state.mode(), GhostMode::Chasing);
        assert_eq!(state.mode_timer(), 0.0);
        assert_eq!(state.last_seen_player(), Some(seen.player));
    }

    #[test]
    fn invulnerability_scares_every_living_mode() {
        for mode in [
            GhostMode::Chasing,
            GhostMode::ChasingAhead,
            GhostMode::Scattering,
            GhostMode::Searching,
        ] {
            let mut state = state_in(mode, 4.0);
            assert!(state.on_invulnerability_changed(true).is_some());
            assert_eq!(state.mode(), GhostMode::Scared);
            assert_eq!(state.mode_timer(), 0.0);
        }

        let mut dead = state_in(GhostMode::Dead, 1.0);
        assert_eq!(dead.on_invulnerability_changed(true), None);
        assert_eq!(dead.mode(), GhostMode::Dead);
    }

    #[test]
    fn scared_only_ends_on_signal() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Scared, 0.0);
        for _ in 0..100 {
            assert_eq!(state.update(1.0, &timings, &ctx_at(Vec2::new(1, 1))), None);
        }
        assert_eq!(state.mode(), GhostMode::Scared);

        assert_eq!(
            state.on_invulnerability_changed(false),
            Some(Transition {
                from: GhostMode::Scared,
                to: GhostMode::Searching
            })
        );

        let mut chasing = state_in(GhostMode::Chasing, 2.0);
        assert_eq!(chasing.on_invulnerability_changed(false), None);
        assert_eq!(chasing.mode_timer(), 2.0);
    }

    #[test]
    fn contact_kills_only_scared_ghosts() {
        let mut scared = state_in(GhostMode::Scared, 1.0);
        assert!(scared.on_player_contact().is_some());
        assert_eq!(scared.mode(), GhostMode::Dead);

        let mut chasing = state_in(GhostMode::Chasing, 1.0);
        assert_eq!(chasing.on_player_contact(), None);
        assert_eq!(chasing.mode(), GhostMode::Chasing);
    }

    #[test]
    fn dead_revives_only_at_spawn() {
        let timings = AiTimings::default();
        let mut state = state_in(GhostMode::Dead, 0.0);
        assert_eq!(state.update(30.0, &timings, &ctx_at(Vec2::new(4, 5))), None);
        assert_eq!(state.mode(), GhostMode::Dead);

        state.update(0.1, &timings, &ctx_at(Vec2::new(9, 9)));
        assert_eq!(state.mode(), GhostMode::Searching);
        assert_eq!(state.mode_timer(), 0.0);
    }

    #[test]
    fn transitions_drop_target_and_path() {
        let level = Level::default_maze().expect("built-in layout");
        let mut state = AgentAiState::new(GhostMode::Chasing);
        let ctx = target_ctx(&level, Vec2::new(1, 1), Direction::Right);
        state.plan(&level, &ctx, SearchAlgorithm::AStar, 0, 90);
        assert!(state.path().is_some());
        assert!(state.target().is_some());

        state.on_invulnerability_changed(true);
        assert!(state.path().is_none());
        assert!(state.target().is_none());
        assert!(state.needs_new_path(level.version(), 0));
    }

    #[test]
    fn path_is_replaced_when_outdated_or_grid_changes() {
        let mut level = Level::default_maze().expect("built-in layout");
        let mut state = AgentAiState::new(GhostMode::Chasing);
        let ctx = target_ctx(&level, Vec2::new(1, 1), Direction::Right);
        state.plan(&level, &ctx, SearchAlgorithm::BreadthFirst, 1_000, 90);
        assert!(!state.needs_new_path(level.version(), 1_050));
        assert!(state.needs_new_path(level.version(), 1_090));

        level.set_tile(Vec2::new(17, 19), crate::level::TileKind::Wall);
        assert!(state.needs_new_path(level.version(), 1_010));
    }

    #[test]
    fn chase_and_dead_targets() {
        let level = Level::default_maze().expect("built-in layout");
        let ctx = target_ctx(&level, Vec2::new(1, 1), Direction::Right);
        assert_eq!(select_target(&level, GhostMode::Chasing, &ctx), ctx.player);
        assert_eq!(select_target(&level, GhostMode::Dead, &ctx), ctx.spawn);
    }

    #[test]
    fn chasing_ahead_stops_at_walls() {
        let level = Level::default_maze().expect("built-in layout");
        let ctx = target_ctx(&level, Vec2::new(1, 1), Direction::Right);
        // player spawn row runs open for four tiles to the left
        assert_eq!(
            select_target(&level, GhostMode::ChasingAhead, &ctx),
            Vec2::new(5, 15)
        );
        let mut blocked = ctx;
        blocked.player_heading = Direction::Down;
        assert_eq!(
            select_target(&level, GhostMode::ChasingAhead, &blocked),
            ctx.player
        );
    }

    #[test]
    fn scatter_picks_intersection_behind_heading() {
        let level = Level::default_maze().expect("built-in layout");
        let agent = level.player_spawn();
        for heading in [Direction::Right, Direction::Left] {
            let ctx = target_ctx(&level, agent, heading);
            let target = select_target(&level, GhostMode::Scattering, &ctx);
            assert!(level.is_intersection(target));
            assert!(heading_dot(agent, target, heading) < 0, "{heading:?} {target:?}");
        }
    }

    #[test]
    fn search_target_is_intersection_not_player_tile() {
        let level = Level::default_maze().expect("built-in layout");
        let ctx = target_ctx(&level, Vec2::new(1, 1), Direction::Down);
        let target = select_target(&level, GhostMode::Searching, &ctx);
        assert!(level.is_intersection(target));
        assert_ne!(target, ctx.player);
        assert!(target.manhattan(ctx.player) <= 4);
    }

    #[test]
    fn escape_target_moves_away_from_player() {
        let level = Level::default_maze().expect("built-in layout");
        let agent = Vec2::new(8, 13);
        let ctx = target_ctx(&level, agent, Direction::Up);
        let target = select_target(&level, GhostMode::Scared, &ctx);
        assert_ne!(target, agent);
        assert!(level.is_walkable(target));
        let from_player: HashMap<Vec2, usize> =
            reachable(&level, ctx.player, None).into_iter().collect();
        assert!(from_player[&target] > from_player[&agent]);
    }

    #[test]
    fn ending_invulnerability_retargets_an_intersection() {
        let level = Level::default_maze().expect("built-in layout");
        let mut state = AgentAiState::new(GhostMode::Chasing);
        state.on_invulnerability_changed(true);
        let agent = Vec2::new(4, 5);
        let ctx = target_ctx(&level, agent, Direction::Down);
        state.plan(&level, &ctx, SearchAlgorithm::AStar, 0, 90);
        assert_eq!(state.mode(), GhostMode::Scared);

        state.on_invulnerability_changed(false);
        assert_eq!(state.mode(), GhostMode::Searching);
        let path = state.plan(&level, &ctx, SearchAlgorithm::AStar, 10, 90);
        assert!(!path.is_empty());
        let target = path.target();
        assert!(level.is_intersection(target));
        assert_ne!(target, ctx.player);
    }

    #[test]
    fn scared_ghost_retargets_when_player_closes_in() {
        let level = Level::default_maze().expect("built-in layout");
        let mut state = AgentAiState::new(GhostMode::Scared);
        let ctx = target_ctx(&level, Vec2::new(8, 13), Direction::Up);
        state.plan(&level, &ctx, SearchAlgorithm::AStar, 0, 90);
        let first = state.target().expect("target chosen");

        let mut moved = ctx;
        moved.player = level.neighbors(first).next().expect("open tile next to target");
        moved.player_last_seen = moved.player;
        state.plan(&level, &moved, SearchAlgorithm::AStar, 50, 90);

        let retargeted = state.target().expect("target chosen");
        assert_ne!(retargeted, first);
        moved.previous_target = Some(first);
        assert_eq!(retargeted, select_target(&level, GhostMode::Scared, &moved));
        let from_player: HashMap<Vec2, usize> =
            reachable(&level, moved.player, None).into_iter().collect();
        assert!(from_player[&retargeted] > from_player[&first]);
    }

    #[test]
    fn scatter_measures_behind_from_mode_entry_heading() {
        let level = Level::default_maze().expect("built-in layout");
        let agent = level.player_spawn();
        let mut state = AgentAiState::new(GhostMode::Scattering);
        state.plan(
            &level,
            &target_ctx(&level, agent, Direction::Right),
            SearchAlgorithm::AStar,
            0,
            90,
        );
        assert_eq!(state.target(), Some(Vec2::new(8, 15)));

        let turned = target_ctx(&level, agent, Direction::Left);
        state.plan(&level, &turned, SearchAlgorithm::AStar, 100, 90);
        assert_eq!(state.target(), Some(Vec2::new(8, 15)));

        let _ = state.set_mode(GhostMode::Searching);
        let _ = state.set_mode(GhostMode::Scattering);
        state.plan(&level, &turned, SearchAlgorithm::AStar, 200, 90);
        assert_eq!(state.target(), Some(Vec2::new(10, 15)));
    }

    #[test]
    fn equal_candidates_prefer_previous_target() {
        let level = Level::default_maze().expect("built-in layout");
        let agent = level.player_spawn();
        let ctx = target_ctx(&level, agent, Direction::None);
        // (8,15) and (10,15) are both one step away.
        assert_eq!(select_target(&level, GhostMode::Scattering, &ctx), Vec2::new(10, 15));
        let mut again = ctx;
        again.previous_target = Some(Vec2::new(8, 15));
        assert_eq!(select_target(&level, GhostMode::Scattering, &again), Vec2::new(8, 15));
    }

    #[test]
    fn unreachable_target_holds_position() {
        let level = Level::parse("#######\n#P#G  #\n#######").expect("valid layout");
        let mut state = AgentAiState::new(GhostMode::Chasing);
        let ctx = TargetContext {
            agent: Vec2::new(3, 1),
            heading: Direction::None,
            spawn: Vec2::new(3, 1),
            player: Vec2::new(1, 1),
            player_heading: Direction::None,
            player_last_seen: Vec2::new(1, 1),
            previous_target: None,
        };
        assert!(state.plan(&level, &ctx, SearchAlgorithm::BreadthFirst, 0, 90).is_empty());
        assert_eq!(state.next_direction(), Direction::None);
        assert!(!state.needs_new_path(level.version(), 50));
    }
}
