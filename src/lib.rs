//! Lays out a room's base around an anchor and feeds the construction queue
//! a few sites at a time.

pub mod rooms;
pub mod storage;
pub mod managers;

#[cfg(target_arch = "wasm32")]
mod game;
#[cfg(target_arch = "wasm32")]
mod logging;

#[cfg(target_arch = "wasm32")]
mod host {
  use log::*;
  use screeps::game;
  use wasm_bindgen::prelude::*;

  use crate::managers::PlannerConfig;
  use crate::{game as glue, logging};

  static INIT_LOGGING: std::sync::Once = std::sync::Once::new();

  #[wasm_bindgen(js_name = loop)]
  pub fn game_loop() {
    INIT_LOGGING.call_once(|| {
      logging::setup_logging(logging::Info);
    });
    glue::run_planner(PlannerConfig::default());
    debug!("done! cpu: {}", game::cpu::get_used());
  }
}
