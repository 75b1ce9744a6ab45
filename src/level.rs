use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::{
    BLANK_INDEX, FLOOR_INDEX, FOOD_INDEX, GHOST_KILLER_INDEX, POWER_UP_INDEX, WALL_INDEX_LIMIT,
};
use crate::types::{Direction, Vec2};

const DEFAULT_LAYOUT: &str = "\
###################
#........#........#
#o##.###.#.###.##o#
#.................#
#.##.#.#####.#.##.#
#....#...#...#....#
####.### # ###.####
---#.#   G   #.#---
####.# ## ## #.####
####.  #GGG#  .####
####.# ##### #.####
---#.#       #.#---
####.# ##### #.####
#........#........#
#.##.###.#.###.##.#
#+.#.....P.....#.+#
##.#.#.#####.#.#.##
#....#...#...#....#
#.######.#.######.#
#.................#
###################";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Blank,
    Wall,
    Floor,
    Food,
    PowerUp,
    GhostKiller,
}

impl TileKind {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            BLANK_INDEX => Some(Self::Blank),
            idx if (0..WALL_INDEX_LIMIT).contains(&idx) => Some(Self::Wall),
            FLOOR_INDEX => Some(Self::Floor),
            FOOD_INDEX => Some(Self::Food),
            POWER_UP_INDEX => Some(Self::PowerUp),
            GHOST_KILLER_INDEX => Some(Self::GhostKiller),
            _ => None,
        }
    }

    pub fn is_walkable(self) -> bool {
        !matches!(self, Self::Wall | Self::Blank)
    }

    pub fn is_pickup(self) -> bool {
        matches!(self, Self::Food | Self::PowerUp | Self::GhostKiller)
    }
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level layout is empty")]
    Empty,
    #[error("row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown tile index {index} at ({x},{y})")]
    UnknownTileIndex { index: i32, x: usize, y: usize },
    #[error("unknown tile character {ch:?} at ({x},{y})")]
    UnknownTileChar { ch: char, x: usize, y: usize },
    #[error("level has no player spawn")]
    MissingPlayerSpawn,
    #[error("level has no ghost spawn")]
    MissingGhostSpawn,
    #[error("spawn ({x},{y}) is not walkable")]
    SpawnNotWalkable { x: i32, y: i32 },
    #[error("failed to read level {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Row-major tile grid with spawn points.
#[derive(Clone, Debug)]
pub struct Level {
    width: i32,
    height: i32,
    tiles: Vec<TileKind>,
    player_spawn: Vec2,
    ghost_spawns: Vec<Vec2>,
    version: u64,
}

impl Level {
    pub fn from_indices(
        rows: &[Vec<i32>],
        player_spawn: Vec2,
        ghost_spawns: Vec<Vec2>,
    ) -> Result<Self, LevelError> {
        let expected = rows.first().map(|row| row.len()).unwrap_or(0);
        if expected == 0 {
            return Err(LevelError::Empty);
        }
        let mut tiles = Vec::with_capacity(expected * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(LevelError::RaggedRow {
                    row: y,
                    expected,
                    found: row.len(),
                });
            }
            for (x, &index) in row.iter().enumerate() {
                let kind = TileKind::from_index(index)
                    .ok_or(LevelError::UnknownTileIndex { index, x, y })?;
                tiles.push(kind);
            }
        }
        Self::assemble(expected, rows.len(), tiles, Some(player_spawn), ghost_spawns)
    }

    /// Parses an ASCII layout.
    ///
    /// `#` wall, `-` blank, ` ` floor, `.` food, `+` power-up, `o` ghost
    /// killer, `P` player spawn, `G` ghost spawn. Spawns sit on floor tiles.
    pub fn parse(text: &str) -> Result<Self, LevelError> {
        let mut lines: Vec<&str> = text.lines().collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        let expected = lines.first().map(|line| line.chars().count()).unwrap_or(0);
        if expected == 0 {
            return Err(LevelError::Empty);
        }

        let mut tiles = Vec::with_capacity(expected * lines.len());
        let mut player_spawn = None;
        let mut ghost_spawns = Vec::new();
        for (y, line) in lines.iter().enumerate() {
            let found = line.chars().count();
            if found != expected {
                return Err(LevelError::RaggedRow {
                    row: y,
                    expected,
                    found,
                });
            }
            for (x, ch) in line.chars().enumerate() {
                let kind = match ch {
                    '#' => TileKind::Wall,
                    '-' => TileKind::Blank,
                    ' ' => TileKind::Floor,
                    '.' => TileKind::Food,
                    '+' => TileKind::PowerUp,
                    'o' => TileKind::GhostKiller,
                    'P' => {
                        if player_spawn.is_some() {
                            warn!(x, y, "extra player spawn ignored");
                        } else {
                            player_spawn = Some(Vec2::new(x as i32, y as i32));
                        }
                        TileKind::Floor
                    }
                    'G' => {
                        ghost_spawns.push(Vec2::new(x as i32, y as i32));
                        TileKind::Floor
                    }
                    _ => return Err(LevelError::UnknownTileChar { ch, x, y }),
                };
                tiles.push(kind);
            }
        }
        Self::assemble(expected, lines.len(), tiles, player_spawn, ghost_spawns)
    }

    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let text = fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let level = Self::parse(&text)?;
        info!(
            path = %path.display(),
            width = level.width,
            height = level.height,
            ghosts = level.ghost_spawns.len(),
            "level loaded"
        );
        Ok(level)
    }

    pub fn default_maze() -> Result<Self, LevelError> {
        Self::parse(DEFAULT_LAYOUT)
    }

    fn assemble(
        width: usize,
        height: usize,
        tiles: Vec<TileKind>,
        player_spawn: Option<Vec2>,
        ghost_spawns: Vec<Vec2>,
    ) -> Result<Self, LevelError> {
        let player_spawn = player_spawn.ok_or(LevelError::MissingPlayerSpawn)?;
        if ghost_spawns.is_empty() {
            return Err(LevelError::MissingGhostSpawn);
        }
        let level = Self {
            width: width as i32,
            height: height as i32,
            tiles,
            player_spawn,
            ghost_spawns,
            version: 0,
        };
        for spawn in std::iter::once(&level.player_spawn).chain(level.ghost_spawns.iter()) {
            if !level.is_walkable(*spawn) {
                return Err(LevelError::SpawnNotWalkable {
                    x: spawn.x,
                    y: spawn.y,
                });
            }
        }
        Ok(level)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn player_spawn(&self) -> Vec2 {
        self.player_spawn
    }

    pub fn ghost_spawns(&self) -> &[Vec2] {
        &self.ghost_spawns
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index_of(&self, pos: Vec2) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: Vec2) -> Option<TileKind> {
        self.index_of(pos).map(|idx| self.tiles[idx])
    }

    pub fn is_walkable(&self, pos: Vec2) -> bool {
        self.tile(pos).is_some_and(TileKind::is_walkable)
    }

    pub fn neighbors(&self, pos: Vec2) -> impl Iterator<Item = Vec2> + '_ {
        let inside = self.in_bounds(pos);
        Direction::ALL
            .into_iter()
            .filter(move |_| inside)
            .map(move |dir| pos.step(dir))
            .filter(|next| self.is_walkable(*next))
    }

    pub fn is_intersection(&self, pos: Vec2) -> bool {
        self.is_walkable(pos) && self.neighbors(pos).count() >= 3
    }

    pub fn line_of_sight(&self, a: Vec2, b: Vec2) -> bool {
        if !self.in_bounds(a) || !self.in_bounds(b) {
            return false;
        }
        if a == b {
            return true;
        }
        if a.x == b.x {
            let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
            return ((lo + 1)..hi).all(|y| self.is_walkable(Vec2::new(a.x, y)));
        }
        if a.y == b.y {
            let (lo, hi) = (a.x.min(b.x), a.x.max(b.x));
            return ((lo + 1)..hi).all(|x| self.is_walkable(Vec2::new(x, a.y)));
        }
        false
    }

    pub fn set_tile(&mut self, pos: Vec2, kind: TileKind) -> bool {
        let Some(idx) = self.index_of(pos) else {
            return false;
        };
        if self.tiles[idx].is_walkable() != kind.is_walkable() {
            self.version += 1;
        }
        self.tiles[idx] = kind;
        true
    }

    pub fn take_pickup(&mut self, pos: Vec2) -> Option<TileKind> {
        let idx = self.index_of(pos)?;
        let kind = self.tiles[idx];
        if !kind.is_pickup() {
            return None;
        }
        self.tiles[idx] = TileKind::Floor;
        Some(kind)
    }

    pub fn food_remaining(&self) -> usize {
        self.tiles
            .iter()
            .filter(|kind| **kind == TileKind::Food)
            .count()
    }

    pub fn cells(&self) -> impl Iterator<Item = (Vec2, TileKind)> + '_ {
        self.tiles.iter().enumerate().map(move |(idx, kind)| {
            let idx = idx as i32;
            (Vec2::new(idx % self.width, idx / self.width), *kind)
        })
    }
}
