pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const CHASE_TIME_SECS: f32 = 20.0;
pub const SCATTER_TIME_SECS: f32 = 10.0;
pub const PATH_TTL_MS: u64 = 90;

pub const PLAYER_BASE_SPEED: f32 = 6.0;
pub const PLAYER_SPEED_BUFF_MULTIPLIER: f32 = 1.3;
pub const GHOST_BASE_SPEED: f32 = 4.6;
pub const GHOST_SCARED_SPEED_MULTIPLIER: f32 = 0.5;
pub const GHOST_DEAD_SPEED_MULTIPLIER: f32 = 2.0;

pub const POWER_DURATION_MS: u64 = 8_000;
pub const SPEED_BUFF_DURATION_MS: u64 = 5_000;
pub const STARTING_LIVES: i32 = 3;
pub const DEFAULT_TIME_LIMIT_MS: u64 = 5 * 60 * 1000;

pub const FOOD_SCORE: i32 = 10;
pub const PICKUP_SCORE: i32 = 50;
pub const GHOST_EAT_SCORE: i32 = 200;

/// Tile indices `0..WALL_INDEX_LIMIT` are wall sprites.
pub const WALL_INDEX_LIMIT: i32 = 64;
pub const BLANK_INDEX: i32 = -1;
pub const FLOOR_INDEX: i32 = 64;
pub const FOOD_INDEX: i32 = 65;
pub const POWER_UP_INDEX: i32 = 66;
pub const GHOST_KILLER_INDEX: i32 = 67;

/// How far (in steps) a scared ghost looks for an escape tile.
pub const SCARED_SEARCH_RADIUS: usize = 10;
/// How many tiles ahead of the player `ChasingAhead` aims.
pub const CHASE_AHEAD_TILES: i32 = 4;
pub const AUTOPILOT_DANGER_DISTANCE: i32 = 4;
