//! Picks the tile the whole base is laid out around.

use log::*;
use minicbor::{Encode, Decode};
use persist_memory::{Persist, PackedXY, ReviveError};
use screeps::RoomXY;

use crate::rooms::tile_slice::*;
use super::error::PlanningError;
use super::snapshot::RoomSnapshot;

/// How far from the middle of the room we look.
pub const SEARCH_RADIUS: u8 = 18;
/// Anything closer to an exit than this is a chokepoint risk.
pub const MIN_EDGE_CLEARANCE: u8 = 7;
/// Radius of the square we count walls in.
pub const WALL_SAMPLE_RADIUS: u8 = 3;

const EDGE_WEIGHT: f32 = 1.0;
const WALL_WEIGHT: f32 = 1.5;
// Feature pull stays under the edge weight, so the anchor never walks out
// of the middle of the room just to get closer to them.
const CONTROLLER_WEIGHT: f32 = 0.3;
const SOURCE_WEIGHT: f32 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
  pub xy: RoomXY,
  /// Tick the anchor was picked on.
  pub chosen_at: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct AnchorRecord {
  #[n(0)] pub xy: PackedXY,
  #[n(1)] pub chosen_at: u32,
}

impl Persist for Anchor {
  type Persisted = AnchorRecord;
  type Context = ();

  fn to_persist(&self) -> AnchorRecord {
    AnchorRecord { xy: self.xy.to_persist(), chosen_at: self.chosen_at }
  }

  fn revive(stored: AnchorRecord, _: ()) -> Result<Anchor, ReviveError> {
    Ok(Anchor { xy: RoomXY::revive(stored.xy, ())?, chosen_at: stored.chosen_at })
  }
}

/// An anchor can be reused as long as it's still somewhere we could stand.
pub fn is_valid_anchor(snapshot: &RoomSnapshot, xy: RoomXY) -> bool {
  !snapshot.is_wall(xy) && !snapshot.is_feature(xy)
}

/// Reuse the stored anchor if it still holds up, otherwise search for a
/// new one. The flag is true when the anchor is new.
pub fn resolve_anchor(
  snapshot: &RoomSnapshot,
  stored: Option<Anchor>
) -> Result<(Anchor, bool), PlanningError> {
  if let Some(anchor) = stored {
    if is_valid_anchor(snapshot, anchor.xy) {
      return Ok((anchor, false));
    }
    warn!("anchor {} in {} is no longer valid", anchor.xy, snapshot.name);
  }
  let xy = select_anchor(snapshot)?;
  info!("picked anchor {} in {}", xy, snapshot.name);
  Ok((Anchor { xy, chosen_at: snapshot.tick }, true))
}

/// Scan around the middle of the room for the best anchor.
///
/// The first best candidate in scan order wins ties.
pub fn select_anchor(snapshot: &RoomSnapshot) -> Result<RoomXY, PlanningError> {
  let center = (ROOM_SIZE / 2, ROOM_SIZE / 2);
  let r = SEARCH_RADIUS as i16;
  let mut best: Option<(f32, RoomXY)> = None;

  for dy in -r..=r {
    for dx in -r..=r {
      let x = center.0 as i16 + dx;
      let y = center.1 as i16 + dy;
      let Some(candidate) = u8::try_from(x).ok()
        .zip(u8::try_from(y).ok())
        .and_then(|(x, y)| xy(x, y)) else {
          continue
        };
      if edge_distance(candidate) < MIN_EDGE_CLEARANCE || !is_valid_anchor(snapshot, candidate) {
        continue
      }
      let score = anchor_score(snapshot, candidate);
      match best {
        Some((best_score, _)) if score <= best_score => (),
        _ => best = Some((score, candidate)),
      }
    }
  }

  best.map(|(_, xy)| xy)
    .ok_or(PlanningError::NoAnchor(snapshot.name))
}

fn wall_density(snapshot: &RoomSnapshot, xy: RoomXY) -> u32 {
  band_around(xy, 1, WALL_SAMPLE_RADIUS)
    .filter(|t| snapshot.is_wall(*t))
    .count() as u32
}

pub fn anchor_score(snapshot: &RoomSnapshot, xy: RoomXY) -> f32 {
  let edge = edge_distance(xy) as f32 * EDGE_WEIGHT;
  let walls = wall_density(snapshot, xy) as f32 * WALL_WEIGHT;
  let controller = snapshot.controller
    .map_or(0.0, |c| range(xy, c) as f32);
  let sources = if snapshot.sources.is_empty() {
    0.0
  } else {
    let total: u32 = snapshot.sources.iter().map(|s| range(xy, *s) as u32).sum();
    total as f32 / snapshot.sources.len() as f32
  };
  edge - walls - (controller * CONTROLLER_WEIGHT + sources * SOURCE_WEIGHT)
}
