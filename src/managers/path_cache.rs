//! Remembered routes from the anchor to the room's features.

use log::*;
use minicbor::{Encode, Decode};
use persist_memory::{Persist, PackedXY, ReviveError};
use screeps::RoomXY;

use crate::rooms::path_search::{search, steps_from, CostGrid, PathStep};
use crate::storage::cache::{CacheEntry, TtlCache};

/// Ceiling on tiles expanded by a single route search.
pub const ROUTE_MAX_OPS: u32 = 4000;

pub fn source_route_key(source: RoomXY) -> String {
  format!("source:{}:{}", source.x.u8(), source.y.u8())
}

pub const CONTROLLER_ROUTE: &str = "controller";
pub const MINERAL_ROUTE: &str = "mineral";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedRoute {
  pub origin: RoomXY,
  pub path: Vec<RoomXY>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathCache {
  routes: TtlCache<CachedRoute>,
  /// How many searches actually ran since this cache was loaded.
  searches: u32,
}

impl PathCache {
  pub fn new() -> PathCache {
    Default::default()
  }

  pub fn searches(&self) -> u32 {
    self.searches
  }

  pub fn len(&self) -> usize {
    self.routes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.routes.is_empty()
  }

  /// Steps from `origin` to within `range` of `goal`.
  ///
  /// A cached route is reused as long as it's younger than `lifetime` and
  /// starts from the same origin. Routes that don't reach the goal aren't
  /// cached and come back as `None`.
  #[allow(clippy::too_many_arguments)]
  pub fn route(
    &mut self,
    key: &str,
    costs: &CostGrid,
    origin: RoomXY,
    goal: RoomXY,
    range: u8,
    now: u32,
    lifetime: u32,
  ) -> Option<Vec<PathStep>> {
    if let Some(cached) = self.routes.get_fresh(key, now, lifetime) {
      if cached.origin == origin {
        trace!("route {key} from cache");
        return Some(steps_from(origin, &cached.path));
      }
    }

    self.searches += 1;
    let result = search(costs, origin, goal, range, ROUTE_MAX_OPS);
    if result.incomplete {
      debug!("route {key} from {origin} to {goal} is incomplete after {} ops", result.ops);
      self.routes.remove(key);
      return None;
    }
    let steps = steps_from(origin, &result.path);
    self.routes.insert(key.to_string(), now, CachedRoute { origin, path: result.path });
    Some(steps)
  }

  /// Drop the oldest routes past the ceiling.
  pub fn prune(&mut self, max_entries: usize) -> usize {
    self.routes.prune(max_entries)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RouteRecord {
  #[n(0)] pub key: String,
  #[n(1)] pub created: u32,
  #[n(2)] pub origin: PackedXY,
  #[n(3)] pub path: Vec<PackedXY>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct PathCacheRecord {
  #[n(0)] pub routes: Vec<RouteRecord>,
}

impl Persist for PathCache {
  type Persisted = PathCacheRecord;
  type Context = ();

  fn to_persist(&self) -> PathCacheRecord {
    let routes = self.routes.iter()
      .map(|(key, entry)| RouteRecord {
        key: key.clone(),
        created: entry.created,
        origin: entry.value.origin.to_persist(),
        path: entry.value.path.to_persist(),
      })
      .collect();
    PathCacheRecord { routes }
  }

  fn revive(stored: PathCacheRecord, _: ()) -> Result<PathCache, ReviveError> {
    let routes = stored.routes.into_iter()
      .map(|record| {
        let value = CachedRoute {
          origin: RoomXY::revive(record.origin, ())?,
          path: Vec::<RoomXY>::revive(record.path, ())?,
        };
        Ok((record.key, CacheEntry { created: record.created, value }))
      })
      .collect::<Result<TtlCache<CachedRoute>, ReviveError>>()?;
    Ok(PathCache { routes, searches: 0 })
  }
}
