//! The turn-rotation workflow: a pure state machine over an opaque token
//! (`state`), the UI screens it emits (`blocks`), and the listeners wiring it
//! into the dispatch layer (`workflow`).

pub mod blocks;
pub mod state;
pub mod workflow;

pub use state::TurnState;
