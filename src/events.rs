use crate::types::{Direction, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityId {
    Player,
    Ghost(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    EntityMoved {
        entity: EntityId,
        dir: Direction,
        pos: Vec2,
    },
    InvulnerabilityChanged {
        active: bool,
    },
}

/// Messages published during a frame, delivered in publish order when the
/// frame drains the queue.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    pending: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
