use screeps::RoomName;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
  /// Every candidate near the middle of the room was a wall or too close to
  /// an exit.
  #[error("no valid anchor in {0}")]
  NoAnchor(RoomName),
  #[error("{0} has no controller to plan around")]
  NoController(RoomName),
}
