use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    /// Neighbor enumeration order used everywhere (N, E, S, W).
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Self {
        match (dx, dy) {
            (0, -1) => Direction::Up,
            (0, 1) => Direction::Down,
            (-1, 0) => Direction::Left,
            (1, 0) => Direction::Right,
            _ => Direction::None,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Vec2) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    Chasing,
    ChasingAhead,
    Scattering,
    Searching,
    Scared,
    Dead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Victory,
    OutOfLives,
    Timeout,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub lives: i32,
    pub score: i32,
    pub invulnerable: bool,
    #[serde(rename = "invulnerableUntil")]
    pub invulnerable_until: u64,
    #[serde(rename = "speedBuffUntil")]
    pub speed_buff_until: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub mode: GhostMode,
    #[serde(rename = "modeTimer")]
    pub mode_timer: f32,
    pub target: Option<Vec2>,
    #[serde(rename = "pathLen")]
    pub path_len: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    FoodEaten {
        x: i32,
        y: i32,
    },
    PowerUpTaken {
        x: i32,
        y: i32,
    },
    GhostKillerTaken {
        x: i32,
        y: i32,
    },
    GhostEaten {
        #[serde(rename = "ghostId")]
        ghost_id: String,
    },
    LifeLost {
        lives: i32,
    },
    ModeChanged {
        #[serde(rename = "ghostId")]
        ghost_id: String,
        from: GhostMode,
        to: GhostMode,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "timeLeftMs")]
    pub time_left_ms: u64,
    #[serde(rename = "foodLeft")]
    pub food_left: usize,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: GameOverReason,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub score: i32,
    pub lives: i32,
    #[serde(rename = "foodLeft")]
    pub food_left: usize,
    #[serde(rename = "ghostsEaten")]
    pub ghosts_eaten: i32,
    #[serde(rename = "livesLost")]
    pub lives_lost: i32,
    #[serde(rename = "pathSearches")]
    pub path_searches: u64,
}
