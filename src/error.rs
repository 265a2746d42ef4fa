//! Error type shared by the map, engine and evaluator layers.
//!
//! Every variant here is a fatal precondition or contract failure. The one
//! recoverable search outcome, "no safe path", lives in
//! [`crate::pathfinding::PathError`] instead.

use crate::game::PlayerKey;
use crate::grid::{Action, Position};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("genome has {actual} cells but a {width}x{height} map needs {expected}")]
    GenomeLength {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
    },

    #[error("genome cell {index} has label {label}, expected 0 (open) or 1 (wall)")]
    InvalidCell { index: usize, label: u8 },

    #[error("unexpected character {ch:?} on map line {line}")]
    InvalidMapChar { line: usize, ch: char },

    #[error("map line {line} has {actual} cells, expected {expected}")]
    RaggedMap {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("map must have a positive width and height")]
    EmptyMap,

    #[error("a {width}x{height} map has more cells than can be addressed")]
    MapTooLarge { width: usize, height: usize },

    #[error("{requested} samples requested, at most {max} allowed")]
    TooManySamples { requested: usize, max: usize },

    #[error("action {action} is not legal for player {player}")]
    IllegalAction { player: PlayerKey, action: Action },

    #[error("no action registered for player {0}")]
    MissingAction(PlayerKey),

    #[error("player {0} is not part of this game")]
    UnknownPlayer(PlayerKey),

    #[error("game is already over")]
    GameOver,

    #[error("no open cell is available for pill placement")]
    NoPillLocations,

    #[error("pill at {0} is not on an open, non-spawn cell")]
    InvalidPill(Position),

    #[error("unknown pursued strategy `{0}`")]
    UnknownPursuedStrategy(String),

    #[error("unknown pursuer strategy `{0}`")]
    UnknownPursuerStrategy(String),

    #[error("unknown pill placement `{0}`")]
    UnknownPillPlacement(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = Error::IllegalAction {
            player: PlayerKey::Pursuer(1),
            action: Action::Hold,
        };
        assert_eq!(err.to_string(), "action hold is not legal for player 1");

        let err = Error::MissingAction(PlayerKey::Pursued(0));
        assert_eq!(err.to_string(), "no action registered for player m");
    }
}
