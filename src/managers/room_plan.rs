//! The layout: which category goes on which tile of a room.
//!
//! A plan is generated once from the anchor and the room's features, then
//! kept for a long time. Only plain coordinates are stored; the room is
//! bound back onto them when the record is revived.

use std::collections::{BTreeMap, HashSet};

use log::*;
use minicbor::{Encode, Decode};
use persist_memory::{Persist, PackedXY, ReviveError};
use screeps::{Position, RoomName, RoomXY};

use crate::rooms::tile_slice::*;
use super::category::Category;
use super::snapshot::RoomSnapshot;
use super::templates::{FeatureSpots, TemplateEntry, LAYOUT_TEMPLATES};

/// Bump this whenever the templates change shape. Stored plans with any
/// other version are thrown away and regenerated.
pub const LAYOUT_VERSION: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutPlan {
  pub version: u32,
  /// Tick the plan was generated on.
  pub created: u32,
  pub room: RoomName,
  pub anchor: RoomXY,
  slots: BTreeMap<Category, Vec<RoomXY>>,
}

impl LayoutPlan {
  /// Every slot for a category, in placement preference order.
  pub fn slots(&self, category: Category) -> &[RoomXY] {
    self.slots.get(&category).map_or(&[], |xys| xys.as_slice())
  }

  pub fn single(&self, category: Category) -> Option<RoomXY> {
    self.slots(category).first().copied()
  }

  /// The slots bound to the room, for handing to the host.
  pub fn positions(&self, category: Category) -> impl Iterator<Item = Position> + '_ {
    let room = self.room;
    self.slots(category).iter()
      .map(move |xy| Position::new(xy.x, xy.y, room))
  }

  pub fn category_at(&self, xy: RoomXY) -> Option<Category> {
    self.iter()
      .find(|(_, slot)| *slot == xy)
      .map(|(category, _)| category)
  }

  pub fn is_reserved(&self, xy: RoomXY) -> bool {
    self.category_at(xy).is_some()
  }

  pub fn iter(&self) -> impl Iterator<Item = (Category, RoomXY)> + '_ {
    self.slots.iter()
      .flat_map(|(category, xys)| xys.iter().map(move |xy| (*category, *xy)))
  }

  pub fn reserved(&self) -> HashSet<RoomXY> {
    self.iter().map(|(_, xy)| xy).collect()
  }

  pub fn age(&self, now: u32) -> u32 {
    now.saturating_sub(self.created)
  }
}

/// Tiles handed out so far. Every category asks here before taking a
/// tile, so no two categories ever end up on the same one.
struct Reservations<'a> {
  snapshot: &'a RoomSnapshot,
  taken: HashSet<RoomXY>,
  /// Tiles nothing may be planned on: features and the ring harvesters
  /// stand on.
  blocked: HashSet<RoomXY>,
}

impl<'a> Reservations<'a> {
  fn new(snapshot: &'a RoomSnapshot) -> Reservations<'a> {
    let mut blocked: HashSet<RoomXY> = snapshot.sources.iter()
      .chain(snapshot.mineral.iter())
      .flat_map(|feature| band_around(*feature, 0, 1))
      .collect();
    blocked.extend(snapshot.controller);
    Reservations { snapshot, taken: HashSet::new(), blocked }
  }

  fn try_reserve(&mut self, xy: RoomXY) -> bool {
    // exits can't be built on, and the tile next to them is useless for
    // anything but walls.
    if edge_distance(xy) < 2 || self.snapshot.is_wall(xy) || self.blocked.contains(&xy) {
      return false;
    }
    self.taken.insert(xy)
  }
}

fn apply_entry(
  entry: &TemplateEntry,
  anchor: RoomXY,
  spots: &FeatureSpots,
  reservations: &mut Reservations,
) -> Vec<RoomXY> {
  let mut placed = Vec::new();
  for group in entry.shape.candidates(anchor, spots) {
    let limit = entry.per_group.unwrap_or(usize::MAX);
    let mut taken = 0;
    for xy in group {
      if taken >= limit {
        break;
      }
      if reservations.try_reserve(xy) {
        placed.push(xy);
        taken += 1;
      }
    }
  }
  placed
}

/// Stamp every template around the anchor.
pub fn generate_layout(snapshot: &RoomSnapshot, anchor: RoomXY) -> LayoutPlan {
  let mut reservations = Reservations::new(snapshot);
  let mut slots: BTreeMap<Category, Vec<RoomXY>> = BTreeMap::new();

  for entry in LAYOUT_TEMPLATES {
    let spots = FeatureSpots {
      storage: slots.get(&Category::Storage).and_then(|xys| xys.first().copied()),
      controller: snapshot.controller,
      sources: &snapshot.sources,
    };
    let placed = apply_entry(entry, anchor, &spots, &mut reservations);
    if placed.is_empty() {
      debug!("no room for {:?} from {:?} in {}", entry.category, entry.shape, snapshot.name);
      continue;
    }
    slots.entry(entry.category).or_default().extend(placed);
  }

  info!(
    "generated layout v{} for {} around {} with {} slots",
    LAYOUT_VERSION, snapshot.name, anchor, reservations.taken.len()
  );

  LayoutPlan {
    version: LAYOUT_VERSION,
    created: snapshot.tick,
    room: snapshot.name,
    anchor,
    slots,
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CategorySlots {
  #[n(0)] pub category: Category,
  #[n(1)] pub xys: Vec<PackedXY>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct LayoutRecord {
  #[n(0)] pub version: u32,
  #[n(1)] pub created: u32,
  #[n(2)] pub anchor: PackedXY,
  #[n(3)] pub slots: Vec<CategorySlots>,
}

/// Bring a stored record up to the current schema. There's no partial
/// migration: anything not written by this version is dropped.
pub fn migrate(record: LayoutRecord) -> Option<LayoutRecord> {
  if record.version == LAYOUT_VERSION {
    Some(record)
  } else {
    info!("discarding layout v{}, current is v{}", record.version, LAYOUT_VERSION);
    None
  }
}

impl Persist for LayoutPlan {
  type Persisted = LayoutRecord;
  type Context = RoomName;

  fn to_persist(&self) -> LayoutRecord {
    LayoutRecord {
      version: self.version,
      created: self.created,
      anchor: self.anchor.to_persist(),
      slots: self.slots.iter()
        .map(|(category, xys)| CategorySlots { category: *category, xys: xys.to_persist() })
        .collect(),
    }
  }

  fn revive(stored: LayoutRecord, room: RoomName) -> Result<LayoutPlan, ReviveError> {
    let mut slots = BTreeMap::new();
    for CategorySlots { category, xys } in stored.slots {
      if slots.insert(category, Vec::<RoomXY>::revive(xys, ())?).is_some() {
        return Err(ReviveError::Malformed("category listed twice"));
      }
    }
    Ok(LayoutPlan {
      version: stored.version,
      created: stored.created,
      room,
      anchor: RoomXY::revive(stored.anchor, ())?,
      slots,
    })
  }
}

/// Why a stored plan can't be used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutStale {
  Missing,
  Corrupt,
  Version(u32),
  Expired { age: u32 },
  AnchorMoved,
  ReplanRequested,
}

/// Decide whether a stored record is still good for this anchor and tick.
pub fn check_layout(
  record: Option<LayoutRecord>,
  room: RoomName,
  anchor: RoomXY,
  now: u32,
  lifetime: u32,
  replan: bool,
) -> Result<LayoutPlan, LayoutStale> {
  let record = record.ok_or(LayoutStale::Missing)?;
  let found = record.version;
  let record = migrate(record).ok_or(LayoutStale::Version(found))?;
  let plan = LayoutPlan::revive(record, room).map_err(|err| {
    warn!("stored layout for {room} is unusable: {err}");
    LayoutStale::Corrupt
  })?;
  if replan {
    Err(LayoutStale::ReplanRequested)
  } else if plan.anchor != anchor {
    Err(LayoutStale::AnchorMoved)
  } else if plan.age(now) > lifetime {
    Err(LayoutStale::Expired { age: plan.age(now) })
  } else {
    Ok(plan)
  }
}
