//! Glue between the live game and the planner: snapshots in, construction
//! site calls out, records kept in a raw memory segment.

use std::cell::RefCell;
use std::collections::HashMap;

use log::*;
use screeps::{
  find, game, look, prelude::*, raw_memory, ConstructionSite, ErrorCode, Part, Position,
  ResourceType, Room, RoomName, StructureObject,
};

use crate::managers::{
  BasePlanner, Category, Placed, PlannerConfig, RoomReport, RoomSnapshot, SiteHost,
  SiteOutcome,
};
use crate::rooms::tile_slice::TileMap;
use crate::storage::serialization::{from_buffer, from_mem_string, to_bytes, to_mem_string};
use crate::storage::MemoryRepository;

/// Raw memory segment holding every room's records.
const PLANNER_SEGMENT: u8 = 2;

thread_local! {
  static SEGMENT_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::new());
  /// Stored energy per room as of the last invocation.
  static LAST_STORED: RefCell<HashMap<RoomName, u32>> = RefCell::new(HashMap::new());
}

fn load_segment() -> Option<MemoryRepository> {
  let segments = raw_memory::segments();
  let Some(mem_str) = segments.get(PLANNER_SEGMENT) else {
    warn!("planner segment not loaded yet");
    return None;
  };
  if mem_str.is_empty() {
    return Some(MemoryRepository::new());
  }
  SEGMENT_BUFFER.with(|cell| {
    let mut buffer = cell.borrow_mut();
    buffer.clear();
    let decoded = from_mem_string(&mem_str, &mut buffer)
      .and_then(|()| from_buffer::<MemoryRepository>(&buffer));
    match decoded {
      Ok(repo) => Some(repo),
      Err(err) => {
        warn!("starting planner records over: {err}");
        Some(MemoryRepository::new())
      }
    }
  })
}

fn store_segment(repo: &MemoryRepository) {
  match to_bytes(repo) {
    Ok(bytes) => raw_memory::segments().set(PLANNER_SEGMENT, to_mem_string(&bytes)),
    Err(err) => warn!("could not write planner segment: {err}"),
  }
}

/// Energy sitting in storage and containers.
fn stored_energy(room: &Room) -> u32 {
  room.find(find::STRUCTURES, None)
    .into_iter()
    .map(|structure| match structure {
      StructureObject::StructureStorage(storage) =>
        storage.store().get_used_capacity(Some(ResourceType::Energy)),
      StructureObject::StructureContainer(container) =>
        container.store().get_used_capacity(Some(ResourceType::Energy)),
      _ => 0,
    })
    .sum()
}

/// Read everything the planner needs out of a visible room.
pub fn snapshot(room: &Room) -> RoomSnapshot {
  let name = room.name();
  let terrain = room.get_terrain();
  let controller = room.controller();

  let structures = room.find(find::STRUCTURES, None)
    .into_iter()
    .filter_map(|structure| {
      Category::from_structure_type(structure.structure_type())
        .map(|category| Placed::new(structure.pos().xy(), category))
    })
    .collect();
  let sites = room.find(find::MY_CONSTRUCTION_SITES, None)
    .into_iter()
    .filter_map(|site| {
      Category::from_structure_type(site.structure_type())
        .map(|category| Placed::new(site.pos().xy(), category))
    })
    .collect();

  let energy_stored = stored_energy(room);
  let energy_trend = LAST_STORED.with(|cell| {
    let mut last = cell.borrow_mut();
    let previous = last.insert(name, energy_stored).unwrap_or(energy_stored);
    energy_stored as i64 - previous as i64
  }) as i32;

  let builders = room.find(find::MY_CREEPS, None)
    .into_iter()
    .filter(|creep| creep.body().iter().any(|part| part.part() == Part::Work))
    .count() as u32;

  RoomSnapshot {
    name,
    tick: game::time(),
    terrain: TileMap::from_fn(|xy| terrain.get(xy.x.u8(), xy.y.u8())),
    structures,
    sites,
    sources: room.find(find::SOURCES, None).iter().map(|s| s.pos().xy()).collect(),
    mineral: room.find(find::MINERALS, None).first().map(|m| m.pos().xy()),
    controller: controller.as_ref().map(|c| c.pos().xy()),
    controller_level: controller.as_ref().map_or(0, |c| c.level()),
    energy_available: room.energy_available(),
    energy_capacity: room.energy_capacity_available(),
    energy_stored,
    energy_trend,
    threat: room.find(find::HOSTILE_CREEPS, None).len() as u32,
    builders,
  }
}

/// Construction calls against the live game.
pub struct GameHost;

impl SiteHost for GameHost {
  fn create_site(&mut self, pos: Position, category: Category) -> SiteOutcome {
    match pos.create_construction_site(category.structure_type(), None) {
      Ok(()) => SiteOutcome::Created,
      Err(ErrorCode::Full) | Err(ErrorCode::RclNotEnough) => SiteOutcome::LimitReached,
      Err(err) => {
        debug!("site for {category:?} at {pos} refused: {err:?}");
        SiteOutcome::InvalidTarget
      }
    }
  }

  fn destroy_structure(&mut self, pos: Position, category: Category) -> bool {
    let Ok(found) = pos.look_for(look::STRUCTURES) else {
      return false;
    };
    found.iter()
      .filter(|s: &&StructureObject| s.structure_type() == category.structure_type())
      .any(|s| s.as_structure().destroy().is_ok())
  }

  fn cancel_site(&mut self, pos: Position, category: Category) -> bool {
    let Ok(found) = pos.look_for(look::CONSTRUCTION_SITES) else {
      return false;
    };
    found.iter()
      .filter(|site: &&ConstructionSite| site.structure_type() == category.structure_type())
      .any(|site| site.remove().is_ok())
  }
}

/// One invocation: plan every room we own and write the records back.
pub fn run_planner(config: PlannerConfig) {
  raw_memory::set_active_segments(&[PLANNER_SEGMENT]);
  let Some(repo) = load_segment() else {
    return;
  };
  let mut planner = BasePlanner::new(repo, config);
  let mut global = planner.global_sites(game::construction_sites().keys().count() as u32);
  let mut host = GameHost;

  for room in game::rooms().values() {
    let owned = room.controller().map_or(false, |c| c.my());
    if !owned {
      continue;
    }
    let name = room.name();
    let walking = room.find(find::MY_CREEPS, None)
      .into_iter()
      .map(|creep| creep.pos().xy());
    planner.record_traffic(name, game::time(), walking);

    let snapshot = snapshot(&room);
    match planner.run_room(&snapshot, &mut host, &mut global) {
      RoomReport::Planned(planned) => {
        debug!("{name}: {} tasks left unreachable", planned.metrics.unreachable);
      }
      RoomReport::Deferred(err) => debug!("{name} deferred: {err}"),
    }
  }

  store_segment(planner.repo());
}
