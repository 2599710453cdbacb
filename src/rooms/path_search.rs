//! Weighted single-room path search.
//!
//! This stands in for the game's PathFinder so that planning code can run
//! (and be tested) without the host. Costs mirror the ones we'd use with
//! `findClosestByPath` when roads are not ignored: plains 2, swamps 10,
//! roads 1.

use std::cmp::Reverse;

use priority_queue::PriorityQueue;
use screeps::{Direction, RoomXY, Terrain};

use super::tile_slice::*;

/// Cost of a tile that can't be entered.
pub const IMPASSABLE: u8 = 255;
pub const ROAD_COST: u8 = 1;
pub const PLAIN_COST: u8 = 2;
pub const SWAMP_COST: u8 = 10;

/// Per-tile movement costs for one room.
#[derive(Clone, Debug, PartialEq)]
pub struct CostGrid(TileMap<u8>);

impl CostGrid {
  /// Build a grid from terrain alone.
  pub fn from_terrain(terrain: &TileMap<Terrain>) -> CostGrid {
    CostGrid(TileMap::from_fn(|xy| match terrain.get(xy) {
      Terrain::Wall => IMPASSABLE,
      Terrain::Swamp => SWAMP_COST,
      Terrain::Plain => PLAIN_COST,
    }))
  }

  #[inline]
  pub fn get(&self, xy: RoomXY) -> u8 {
    self.0.get(xy)
  }

  #[inline]
  pub fn set(&mut self, xy: RoomXY, cost: u8) {
    self.0.set(xy, cost);
  }

  /// Mark a road, unless the tile is already blocked.
  pub fn set_road(&mut self, xy: RoomXY) {
    if self.get(xy) != IMPASSABLE {
      self.set(xy, ROAD_COST);
    }
  }

  pub fn block(&mut self, xy: RoomXY) {
    self.set(xy, IMPASSABLE);
  }

  #[inline]
  pub fn passable(&self, xy: RoomXY) -> bool {
    self.get(xy) != IMPASSABLE
  }
}

/// What a path search produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResult {
  /// Tiles walked, excluding the origin and including the last step.
  pub path: Vec<RoomXY>,
  pub cost: u32,
  /// Set when the goal wasn't reached, either because it's cut off or
  /// because we ran out of operations.
  pub incomplete: bool,
  pub ops: u32,
}

/// One step of a path, with the direction taken to reach it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
  pub xy: RoomXY,
  pub direction: Direction,
}

/// Turn a list of tiles into steps, given where the walk starts.
///
/// Stops at the first gap in the list, which can only come from a corrupt
/// cache entry.
pub fn steps_from(origin: RoomXY, path: &[RoomXY]) -> Vec<PathStep> {
  let mut prev = origin;
  let mut steps = Vec::with_capacity(path.len());
  for &xy in path {
    match direction_between(prev, xy) {
      Some(direction) => steps.push(PathStep { xy, direction }),
      None => break,
    }
    prev = xy;
  }
  steps
}

/// A* from `origin` to any tile within `range` of `goal`.
///
/// The goal tile itself doesn't need to be passable when `range > 0`, which
/// is what lets us path next to sources and controllers. At most `max_ops`
/// tiles are expanded.
pub fn search(
  costs: &CostGrid,
  origin: RoomXY,
  goal: RoomXY,
  range_to_goal: u8,
  max_ops: u32,
) -> PathResult {
  let mut best: TileMap<u32> = TileMap::new_box(u32::MAX);
  let mut parent: TileMap<Option<RoomXY>> = TileMap::new_box(None);
  // ties on f-cost are broken by tile index so searches are repeatable.
  let mut queue: PriorityQueue<RoomXY, Reverse<(u32, u16)>> = PriorityQueue::new();
  let heuristic = |xy: RoomXY| (range(xy, goal).saturating_sub(range_to_goal)) as u32;

  best.set(origin, 0);
  queue.push(origin, Reverse((heuristic(origin), xy_key(origin))));

  let mut ops = 0;
  let mut closest = (heuristic(origin), 0u32, origin);

  while let Some((current, _)) = queue.pop() {
    if range(current, goal) <= range_to_goal {
      return PathResult {
        path: walk_back(&parent, origin, current),
        cost: best.get(current),
        incomplete: false,
        ops,
      };
    }
    if ops >= max_ops {
      break;
    }
    ops += 1;

    let current_cost = best.get(current);
    let h = heuristic(current);
    if h < closest.0 || (h == closest.0 && current_cost < closest.1) {
      closest = (h, current_cost, current);
    }

    for next in surrounding_xy(current) {
      let step = costs.get(next);
      if step == IMPASSABLE {
        continue;
      }
      let next_cost = current_cost + step as u32;
      if next_cost < best.get(next) {
        best.set(next, next_cost);
        parent.set(next, Some(current));
        let f = next_cost + heuristic(next);
        queue.push_increase(next, Reverse((f, xy_key(next))));
      }
    }
  }

  // We didn't get there; hand back the best partial path so callers can
  // decide what to do with it.
  let (_, cost, end) = closest;
  PathResult {
    path: walk_back(&parent, origin, end),
    cost,
    incomplete: true,
    ops,
  }
}

fn walk_back(parent: &TileMap<Option<RoomXY>>, origin: RoomXY, end: RoomXY) -> Vec<RoomXY> {
  let mut path = Vec::new();
  let mut cur = end;
  while cur != origin {
    path.push(cur);
    match parent.get(cur) {
      Some(prev) => cur = prev,
      None => break,
    }
  }
  path.reverse();
  path
}
