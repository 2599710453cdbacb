pub mod category;
pub mod snapshot;
pub mod error;
pub mod anchor;
pub mod templates;
pub mod room_plan;
pub mod path_cache;
pub mod traffic;
pub mod tasks;
pub mod construction;
pub mod planner;

#[cfg(test)]
pub mod testing;

pub use category::Category;
pub use construction::{ExecutionReport, GlobalSites, SiteHost, SiteOutcome};
pub use error::PlanningError;
pub use planner::{BasePlanner, PlannerConfig, RoomReport};
pub use snapshot::{Placed, RoomSnapshot};
