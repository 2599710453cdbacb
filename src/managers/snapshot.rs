use screeps::{Position, RoomName, RoomXY, Terrain};

use crate::rooms::tile_slice::*;
use super::category::Category;

/// A structure or construction site sitting on a tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Placed {
  pub xy: RoomXY,
  pub category: Category,
}

impl Placed {
  pub fn new(xy: RoomXY, category: Category) -> Placed {
    Placed { xy, category }
  }
}

/// Everything the planner is allowed to know about a room this tick.
///
/// This is rebuilt from the game every invocation and never stored.
#[derive(Clone, Debug)]
pub struct RoomSnapshot {
  pub name: RoomName,
  pub tick: u32,
  pub terrain: TileMap<Terrain>,
  /// Built structures we have a category for.
  pub structures: Vec<Placed>,
  /// Our construction sites.
  pub sites: Vec<Placed>,
  pub sources: Vec<RoomXY>,
  pub mineral: Option<RoomXY>,
  pub controller: Option<RoomXY>,
  pub controller_level: u8,
  pub energy_available: u32,
  pub energy_capacity: u32,
  pub energy_stored: u32,
  /// Change in stored energy since the last invocation.
  pub energy_trend: i32,
  pub threat: u32,
  pub builders: u32,
}

impl RoomSnapshot {
  #[inline]
  pub fn terrain(&self, xy: RoomXY) -> Terrain {
    self.terrain.get(xy)
  }

  #[inline]
  pub fn is_wall(&self, xy: RoomXY) -> bool {
    self.terrain(xy) == Terrain::Wall
  }

  pub fn position(&self, xy: RoomXY) -> Position {
    Position::new(xy.x, xy.y, self.name)
  }

  pub fn structures_at(&self, xy: RoomXY) -> impl Iterator<Item = Category> + '_ {
    self.structures.iter()
      .filter(move |placed| placed.xy == xy)
      .map(|placed| placed.category)
  }

  pub fn sites_at(&self, xy: RoomXY) -> impl Iterator<Item = Category> + '_ {
    self.sites.iter()
      .filter(move |placed| placed.xy == xy)
      .map(|placed| placed.category)
  }

  pub fn has_structure(&self, xy: RoomXY, category: Category) -> bool {
    self.structures_at(xy).any(|c| c == category)
  }

  pub fn has_site(&self, xy: RoomXY, category: Category) -> bool {
    self.sites_at(xy).any(|c| c == category)
  }

  /// Built or queued.
  pub fn has_planned(&self, xy: RoomXY, category: Category) -> bool {
    self.has_structure(xy, category) || self.has_site(xy, category)
  }

  pub fn built_count(&self, category: Category) -> u32 {
    self.structures.iter().filter(|p| p.category == category).count() as u32
  }

  pub fn queued_count(&self, category: Category) -> u32 {
    self.sites.iter().filter(|p| p.category == category).count() as u32
  }

  /// Built plus queued, which is what counts against a cap.
  pub fn total_count(&self, category: Category) -> u32 {
    self.built_count(category) + self.queued_count(category)
  }

  pub fn positions_of(&self, category: Category) -> impl Iterator<Item = RoomXY> + '_ {
    self.structures.iter()
      .chain(self.sites.iter())
      .filter(move |p| p.category == category)
      .map(|p| p.xy)
  }

  /// Sources, the controller and the mineral can never be built on.
  pub fn is_feature(&self, xy: RoomXY) -> bool {
    self.sources.contains(&xy)
      || self.controller == Some(xy)
      || self.mineral == Some(xy)
  }

  /// Whether a creep could stand here: not a wall, not a feature, and no
  /// solid structure or site in the way.
  pub fn is_passable(&self, xy: RoomXY) -> bool {
    !self.is_wall(xy)
      && !self.is_feature(xy)
      && self.structures_at(xy).chain(self.sites_at(xy)).all(Category::walkable)
  }

  /// Nothing built or queued at all.
  pub fn is_empty_tile(&self, xy: RoomXY) -> bool {
    self.structures_at(xy).next().is_none() && self.sites_at(xy).next().is_none()
  }

  /// Fraction of spawn energy that is currently filled.
  pub fn energy_ratio(&self) -> f32 {
    if self.energy_capacity == 0 {
      0.0
    } else {
      self.energy_available as f32 / self.energy_capacity as f32
    }
  }
}
