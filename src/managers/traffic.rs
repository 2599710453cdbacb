//! Where creeps actually walk, so roads can follow them.

use std::collections::BTreeMap;

use itertools::Itertools;
use minicbor::{Encode, Decode};
use persist_memory::{Persist, PackedXY, ReviveError};
use screeps::RoomXY;

use crate::rooms::tile_slice::*;

/// Counters under this are forgotten when the map decays.
pub const TRAFFIC_FLOOR: u32 = 2;

/// A decaying visit count per tile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrafficMap {
  visits: BTreeMap<u16, u32>,
  last_decay: u32,
}

impl TrafficMap {
  pub fn new(now: u32) -> TrafficMap {
    TrafficMap { visits: BTreeMap::new(), last_decay: now }
  }

  pub fn record(&mut self, xy: RoomXY) {
    let count = self.visits.entry(xy_key(xy)).or_insert(0);
    *count = count.saturating_add(1);
  }

  pub fn count(&self, xy: RoomXY) -> u32 {
    self.visits.get(&xy_key(xy)).copied().unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.visits.len()
  }

  pub fn is_empty(&self) -> bool {
    self.visits.is_empty()
  }

  /// Halve every counter and drop the ones that fall under the floor.
  pub fn decay(&mut self, now: u32) {
    for count in self.visits.values_mut() {
      *count /= 2;
    }
    self.visits.retain(|_, count| *count >= TRAFFIC_FLOOR);
    self.last_decay = now;
  }

  /// Decay if a full period has passed since the last time.
  pub fn maybe_decay(&mut self, now: u32, period: u32) -> bool {
    if now.saturating_sub(self.last_decay) >= period {
      self.decay(now);
      true
    } else {
      false
    }
  }

  /// The busiest tiles with at least `min_visits`, busiest first. Ties go
  /// to the lower tile index.
  pub fn hottest(
    &self,
    n: usize,
    min_visits: u32,
    mut exclude: impl FnMut(RoomXY) -> bool,
  ) -> Vec<RoomXY> {
    self.visits.iter()
      .filter(|(_, count)| **count >= min_visits)
      .map(|(key, count)| (*count, *key))
      .sorted_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
      .map(|(_, key)| linear_index_to_xy(key as usize))
      .filter(|xy| !exclude(*xy))
      .take(n)
      .collect()
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct VisitRecord {
  #[n(0)] pub xy: PackedXY,
  #[n(1)] pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TrafficRecord {
  #[n(0)] pub last_decay: u32,
  #[n(1)] pub visits: Vec<VisitRecord>,
}

impl Persist for TrafficMap {
  type Persisted = TrafficRecord;
  type Context = ();

  fn to_persist(&self) -> TrafficRecord {
    let visits = self.visits.iter()
      .map(|(key, count)| VisitRecord {
        xy: linear_index_to_xy(*key as usize).to_persist(),
        count: *count,
      })
      .collect();
    TrafficRecord { last_decay: self.last_decay, visits }
  }

  fn revive(stored: TrafficRecord, _: ()) -> Result<TrafficMap, ReviveError> {
    let mut visits = BTreeMap::new();
    for VisitRecord { xy, count } in stored.visits {
      visits.insert(xy_key(RoomXY::revive(xy, ())?), count);
    }
    Ok(TrafficMap { visits, last_decay: stored.last_decay })
  }
}
