pub mod agents;
pub mod api;
pub mod error;
pub mod fitness;
pub mod game;
pub mod grid;
pub mod pathfinding;
pub mod repair;
pub mod replay;

pub use error::{Error, Result};
