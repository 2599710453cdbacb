//! Room snapshots and a fake host for tests.

use std::collections::HashSet;

use screeps::{Position, RoomName, RoomXY, Terrain};

use crate::rooms::tile_slice::*;
use super::category::Category;
use super::construction::{SiteHost, SiteOutcome};
use super::snapshot::{Placed, RoomSnapshot};

pub fn at(x: u8, y: u8) -> RoomXY {
  xy(x, y).expect("valid coords")
}

pub fn test_room() -> RoomName {
  RoomName::new("W1N1").expect("room name")
}

pub struct SnapshotBuilder {
  snapshot: RoomSnapshot,
}

impl SnapshotBuilder {
  fn with_terrain(terrain: Terrain) -> SnapshotBuilder {
    SnapshotBuilder {
      snapshot: RoomSnapshot {
        name: test_room(),
        tick: 1,
        terrain: TileMap::new_box(terrain),
        structures: Vec::new(),
        sites: Vec::new(),
        sources: Vec::new(),
        mineral: None,
        controller: None,
        controller_level: 1,
        energy_available: 300,
        energy_capacity: 300,
        energy_stored: 0,
        energy_trend: 0,
        threat: 0,
        builders: 0,
      },
    }
  }

  /// Plain ground everywhere.
  pub fn open() -> SnapshotBuilder {
    Self::with_terrain(Terrain::Plain)
  }

  /// Nothing but rock.
  pub fn walled() -> SnapshotBuilder {
    Self::with_terrain(Terrain::Wall)
  }

  pub fn controller(mut self, xy: RoomXY) -> Self {
    self.snapshot.controller = Some(xy);
    self
  }

  pub fn source(mut self, xy: RoomXY) -> Self {
    self.snapshot.sources.push(xy);
    self
  }

  pub fn mineral(mut self, xy: RoomXY) -> Self {
    self.snapshot.mineral = Some(xy);
    self
  }

  fn paint(mut self, x1: u8, y1: u8, x2: u8, y2: u8, terrain: Terrain) -> Self {
    for x in x1..=x2 {
      for y in y1..=y2 {
        self.snapshot.terrain.set(at(x, y), terrain);
      }
    }
    self
  }

  /// Inclusive on both corners.
  pub fn wall_rect(self, x1: u8, y1: u8, x2: u8, y2: u8) -> Self {
    self.paint(x1, y1, x2, y2, Terrain::Wall)
  }

  pub fn open_rect(self, x1: u8, y1: u8, x2: u8, y2: u8) -> Self {
    self.paint(x1, y1, x2, y2, Terrain::Plain)
  }

  pub fn tick(mut self, tick: u32) -> Self {
    self.snapshot.tick = tick;
    self
  }

  pub fn level(mut self, level: u8) -> Self {
    self.snapshot.controller_level = level;
    self
  }

  pub fn structure(mut self, xy: RoomXY, category: Category) -> Self {
    self.snapshot.structures.push(Placed::new(xy, category));
    self
  }

  pub fn site(mut self, xy: RoomXY, category: Category) -> Self {
    self.snapshot.sites.push(Placed::new(xy, category));
    self
  }

  pub fn energy(mut self, available: u32, capacity: u32) -> Self {
    self.snapshot.energy_available = available;
    self.snapshot.energy_capacity = capacity;
    self
  }

  pub fn stored(mut self, stored: u32, trend: i32) -> Self {
    self.snapshot.energy_stored = stored;
    self.snapshot.energy_trend = trend;
    self
  }

  pub fn threat(mut self, threat: u32) -> Self {
    self.snapshot.threat = threat;
    self
  }

  pub fn builders(mut self, builders: u32) -> Self {
    self.snapshot.builders = builders;
    self
  }

  pub fn build(self) -> RoomSnapshot {
    self.snapshot
  }
}

/// Records every request and says yes unless told otherwise.
#[derive(Debug, Default)]
pub struct FakeHost {
  pub created: Vec<Placed>,
  pub destroyed: Vec<RoomXY>,
  pub cancelled: Vec<RoomXY>,
  rejected: HashSet<RoomXY>,
  limit: Option<usize>,
  total_created: usize,
}

impl FakeHost {
  pub fn new() -> FakeHost {
    Default::default()
  }

  /// Answer `InvalidTarget` for sites on this tile.
  pub fn reject(mut self, xy: RoomXY) -> Self {
    self.rejected.insert(xy);
    self
  }

  /// Answer `LimitReached` once this many sites exist.
  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Play the recorded requests into the snapshot, like the next tick would
  /// show them, and forget them.
  pub fn apply(&mut self, snapshot: &mut RoomSnapshot) {
    for xy in self.destroyed.drain(..) {
      snapshot.structures.retain(|p| !(p.xy == xy && p.category == Category::Road));
    }
    for xy in self.cancelled.drain(..) {
      snapshot.sites.retain(|p| !(p.xy == xy && p.category == Category::Road));
    }
    snapshot.sites.append(&mut self.created);
  }
}

impl SiteHost for FakeHost {
  fn create_site(&mut self, pos: Position, category: Category) -> SiteOutcome {
    let xy = pos.xy();
    if self.limit.map_or(false, |limit| self.total_created >= limit) {
      return SiteOutcome::LimitReached;
    }
    if self.rejected.contains(&xy) {
      return SiteOutcome::InvalidTarget;
    }
    self.total_created += 1;
    self.created.push(Placed::new(xy, category));
    SiteOutcome::Created
  }

  fn destroy_structure(&mut self, pos: Position, _: Category) -> bool {
    self.destroyed.push(pos.xy());
    true
  }

  fn cancel_site(&mut self, pos: Position, _: Category) -> bool {
    self.cancelled.push(pos.xy());
    true
  }
}
