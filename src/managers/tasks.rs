//! Turns the gap between the layout and the room into construction tasks.
//!
//! Nothing here is cached. Every invocation rebuilds the whole list from
//! the snapshot, so the same room state always produces the same tasks in
//! the same order.

use std::collections::{BTreeMap, HashMap, HashSet};

use enum_iterator::Sequence;
use log::*;
use screeps::RoomXY;

use crate::rooms::path_search::{search, CostGrid};
use crate::rooms::tile_slice::*;
use super::category::Category;
use super::path_cache::{source_route_key, PathCache, CONTROLLER_ROUTE, MINERAL_ROUTE};
use super::room_plan::LayoutPlan;
use super::snapshot::RoomSnapshot;
use super::templates::CORE_RADIUS;

pub const SPAWN_PRIORITY: u32 = 950;
pub const SOURCE_CONTAINER_PRIORITY: u32 = 900;
pub const HUB_ROAD_PRIORITY: u32 = 880;
pub const FIRST_TOWER_PRIORITY: u32 = 870;
pub const EXTENSION_PRIORITY: u32 = 800;
pub const STORAGE_PRIORITY: u32 = 760;
pub const TOWER_PRIORITY: u32 = 750;
pub const CONTROLLER_CONTAINER_PRIORITY: u32 = 700;
pub const LINK_PRIORITY: u32 = 600;
pub const ROUTE_ROAD_PRIORITY: u32 = 500;
pub const RAMPART_PRIORITY: u32 = 450;
pub const REDUNDANT_ROAD_PRIORITY: u32 = 250;
pub const PERIMETER_PRIORITY: u32 = 150;

/// Each tile further along a route is worth this much less.
const ROUTE_DECAY: u32 = 5;
const ROUTE_FLOOR: u32 = 100;

pub const THREAT_BONUS: u32 = 200;
pub const ECONOMY_BONUS: u32 = 150;
/// Economy tasks get the bonus while spawn energy is under this fraction.
pub const ECONOMY_RATIO: f32 = 0.5;

pub const CRITICAL_THRESHOLD: u32 = 800;
pub const IMPORTANT_THRESHOLD: u32 = 500;
pub const NORMAL_THRESHOLD: u32 = 200;

/// Containers and hub roads are urgent up to this level.
pub const BOOTSTRAP_LEVEL: u8 = 3;
pub const RAMPART_LEVEL: u8 = 5;
pub const PERIMETER_LEVEL: u8 = 4;
pub const REDUNDANT_ROAD_LEVEL: u8 = 4;
pub const REDUNDANT_ROAD_CAPACITY: u32 = 1300;

/// Extensions are searched this far out from the anchor.
pub const EXTENSION_SEARCH_RADIUS: u8 = 10;
/// Ops allowed for the reachability check of one extension.
pub const EXTENSION_REACH_OPS: u32 = 500;

/// Energy one builder puts into a site per tick, for the time estimate.
pub const BUILD_RATE: u32 = 10;

/// Something that has to exist before a task is worth placing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
  StorageExists,
  TerminalExists,
  ExtractorExists,
}

impl Dependency {
  pub fn is_met(self, snapshot: &RoomSnapshot) -> bool {
    let category = match self {
      Dependency::StorageExists => Category::Storage,
      Dependency::TerminalExists => Category::Terminal,
      Dependency::ExtractorExists => Category::Extractor,
    };
    snapshot.built_count(category) > 0
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskReason {
  Spawn,
  SourceContainer,
  HubRoad,
  Tower,
  Extension,
  Core,
  ControllerContainer,
  Link,
  RouteRoad,
  LateGame,
  MineralContainer,
  Rampart,
  RedundantRoad,
  Perimeter,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Sequence)]
pub enum Bucket {
  Critical,
  Important,
  Normal,
  Deferred,
}

impl Bucket {
  pub fn of(priority: u32, urgent: bool) -> Bucket {
    if urgent || priority >= CRITICAL_THRESHOLD {
      Bucket::Critical
    } else if priority >= IMPORTANT_THRESHOLD {
      Bucket::Important
    } else if priority >= NORMAL_THRESHOLD {
      Bucket::Normal
    } else {
      Bucket::Deferred
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructionTask {
  pub category: Category,
  pub xy: RoomXY,
  pub priority: u32,
  pub reason: TaskReason,
  pub cost: u32,
  pub dependencies: Vec<Dependency>,
  pub urgent: bool,
  pub bucket: Bucket,
}

impl ConstructionTask {
  /// The first dependency the room doesn't satisfy yet.
  pub fn unmet_dependency(&self, snapshot: &RoomSnapshot) -> Option<Dependency> {
    self.dependencies.iter().copied().find(|dep| !dep.is_met(snapshot))
  }
}

/// Informational only; none of this gates placement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanMetrics {
  pub count: usize,
  pub total_cost: u32,
  pub estimated_ticks: u32,
  /// Built structures over everything built, queued or still to do.
  pub completion: f32,
  /// Extension candidates dropped for being unreachable.
  pub unreachable: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstructionPlan {
  /// Bucket by bucket, each by descending priority.
  pub tasks: Vec<ConstructionTask>,
  pub metrics: PlanMetrics,
}

impl ConstructionPlan {
  pub fn bucket(&self, bucket: Bucket) -> impl Iterator<Item = &ConstructionTask> {
    self.tasks.iter().filter(move |task| task.bucket == bucket)
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

/// Movement costs with everything solid blocked, built or planned. Planned
/// roads are as cheap as built ones so routes line up with the layout.
pub fn planning_grid(snapshot: &RoomSnapshot, layout: &LayoutPlan) -> CostGrid {
  let mut grid = CostGrid::from_terrain(&snapshot.terrain);
  for feature in snapshot.sources.iter().chain(snapshot.mineral.iter()).chain(snapshot.controller.iter()) {
    grid.block(*feature);
  }
  for (category, xy) in layout.iter() {
    match category {
      Category::Road => grid.set_road(xy),
      c if c.walkable() => (),
      _ => grid.block(xy),
    }
  }
  for placed in snapshot.structures.iter().chain(snapshot.sites.iter()) {
    match placed.category {
      Category::Road => grid.set_road(placed.xy),
      c if c.walkable() => (),
      _ => grid.block(placed.xy),
    }
  }
  grid
}

struct Generator<'a> {
  snapshot: &'a RoomSnapshot,
  layout: &'a LayoutPlan,
  slots: HashMap<RoomXY, Category>,
  grid: CostGrid,
  tasks: Vec<ConstructionTask>,
  emitted: HashSet<RoomXY>,
  remaining: BTreeMap<Category, u32>,
  unreachable: u32,
}

impl<'a> Generator<'a> {
  fn new(snapshot: &'a RoomSnapshot, layout: &'a LayoutPlan) -> Generator<'a> {
    let level = snapshot.controller_level;
    let remaining = all::<Category>()
      .map(|c| (c, c.cap(level).saturating_sub(snapshot.total_count(c))))
      .collect();
    Generator {
      snapshot,
      layout,
      slots: layout.iter().map(|(category, xy)| (xy, category)).collect(),
      grid: planning_grid(snapshot, layout),
      tasks: Vec::new(),
      emitted: HashSet::new(),
      remaining,
      unreachable: 0,
    }
  }

  /// What the layout puts on a tile.
  fn planned(&self, xy: RoomXY) -> Option<Category> {
    self.slots.get(&xy).copied()
  }

  fn remaining(&self, category: Category) -> u32 {
    self.remaining.get(&category).copied().unwrap_or(0)
  }

  fn adjusted(&self, category: Category, base: u32) -> u32 {
    let mut priority = base;
    if self.snapshot.threat > 0 && category.is_defensive() {
      priority += THREAT_BONUS;
    }
    if category.is_economic() && self.snapshot.energy_ratio() < ECONOMY_RATIO {
      priority += ECONOMY_BONUS;
    }
    priority
  }

  /// Queue a task unless it's already there, already queued this pass or
  /// over the category's cap. Returns whether it was queued.
  fn emit(
    &mut self,
    category: Category,
    xy: RoomXY,
    base: u32,
    reason: TaskReason,
    dependencies: &[Dependency],
    urgent: bool,
  ) -> bool {
    if self.snapshot.has_planned(xy, category) || self.remaining(category) == 0 {
      return false;
    }
    // one task per tile, except ramparts which go on top of things
    if category != Category::Rampart && !self.emitted.insert(xy) {
      return false;
    }
    if let Some(left) = self.remaining.get_mut(&category) {
      *left -= 1;
    }
    let priority = self.adjusted(category, base);
    self.tasks.push(ConstructionTask {
      category,
      xy,
      priority,
      reason,
      cost: category.build_cost(),
      dependencies: dependencies.to_vec(),
      urgent,
      bucket: Bucket::of(priority, urgent),
    });
    true
  }

  /// Whether `category` could ever go on `xy` without tearing down
  /// anything but a road.
  fn slot_usable(&self, category: Category, xy: RoomXY) -> bool {
    if self.snapshot.is_wall(xy) || self.snapshot.is_feature(xy) {
      return false;
    }
    self.snapshot.structures_at(xy)
      .chain(self.snapshot.sites_at(xy))
      .all(|occupant| occupant == Category::Road || category.can_share_with(occupant))
  }

  /// Free tile for a container: empty first, then tiles holding only roads
  /// or ramparts.
  fn container_spot(&self, tiles: Vec<RoomXY>) -> Option<RoomXY> {
    let open = |xy: &RoomXY| !self.snapshot.is_wall(*xy)
      && !self.snapshot.is_feature(*xy)
      && self.planned(*xy).map_or(true, Category::walkable)
      && !self.emitted.contains(xy);
    tiles.iter().copied()
      .filter(open)
      .find(|xy| self.snapshot.is_empty_tile(*xy))
      .or_else(|| tiles.iter().copied().filter(open).find(|xy| {
        self.snapshot.structures_at(*xy)
          .chain(self.snapshot.sites_at(*xy))
          .all(|c| matches!(c, Category::Road | Category::Rampart))
      }))
  }

  /// Tiles around any of `centers` that the layout left free or gave to a
  /// road, closest ring first.
  fn fallback_spots(&self, category: Category, centers: &[RoomXY], min: u8, max: u8) -> Vec<RoomXY> {
    let mut spots = Vec::new();
    for radius in min..=max {
      for center in centers {
        for xy in ring_around(*center, radius) {
          if self.planned(xy).map_or(true, |c| c == Category::Road)
            && !self.emitted.contains(&xy)
            && !spots.contains(&xy)
            && edge_distance(xy) >= 2
            && self.slot_usable(category, xy) {
            spots.push(xy);
          }
        }
      }
    }
    spots
  }

  /// Fill a category from its layout slots, then from `fallback` if the
  /// layout ran out.
  fn fill_from_layout(
    &mut self,
    category: Category,
    priority: impl Fn(u32) -> (u32, bool),
    reason: TaskReason,
    dependencies: &[Dependency],
    fallback: Option<(&[RoomXY], u8, u8)>,
  ) {
    let mut candidates: Vec<RoomXY> = self.layout.slots(category).iter().copied()
      .filter(|xy| self.slot_usable(category, *xy))
      .collect();
    if let Some((centers, min, max)) = fallback {
      let wanted = self.remaining(category) as usize;
      let from_layout = candidates.iter()
        .filter(|xy| !self.snapshot.has_planned(**xy, category))
        .count();
      if from_layout < wanted {
        debug!("{:?} falling back to a search in {}", category, self.snapshot.name);
        candidates.extend(self.fallback_spots(category, centers, min, max));
      }
    }
    for xy in candidates {
      if self.remaining(category) == 0 {
        break;
      }
      let (base, urgent) = priority(self.snapshot.total_count(category) + self.pending(category));
      self.emit(category, xy, base, reason, dependencies, urgent);
    }
  }

  fn pending(&self, category: Category) -> u32 {
    self.tasks.iter().filter(|task| task.category == category).count() as u32
  }

  fn spawns(&mut self) {
    let anchor = self.layout.anchor;
    self.fill_from_layout(
      Category::Spawn,
      |existing| (SPAWN_PRIORITY, existing == 0),
      TaskReason::Spawn,
      &[],
      Some((&[anchor][..], CORE_RADIUS + 1, CORE_RADIUS + 3)),
    );
  }

  fn source_containers(&mut self) {
    let urgent = self.snapshot.controller_level <= BOOTSTRAP_LEVEL;
    let snapshot = self.snapshot;
    for &source in &snapshot.sources {
      let has_one = band_around(source, 1, 1)
        .any(|xy| snapshot.has_planned(xy, Category::Container));
      if has_one {
        continue;
      }
      match self.container_spot(ring_around(source, 1).collect()) {
        Some(xy) => {
          self.emit(Category::Container, xy, SOURCE_CONTAINER_PRIORITY, TaskReason::SourceContainer, &[], urgent);
        }
        None => warn!("no container spot next to source {} in {}", source, snapshot.name),
      }
    }
  }

  fn hub_roads(&mut self) {
    let urgent = self.snapshot.controller_level <= BOOTSTRAP_LEVEL;
    let anchor = self.layout.anchor;
    let hub: Vec<RoomXY> = self.layout.slots(Category::Road).iter().copied()
      .filter(|xy| range(*xy, anchor) <= CORE_RADIUS)
      .collect();
    for xy in hub {
      self.emit(Category::Road, xy, HUB_ROAD_PRIORITY, TaskReason::HubRoad, &[], urgent);
    }
  }

  fn towers(&mut self) {
    let spawns: Vec<RoomXY> = self.snapshot.positions_of(Category::Spawn).collect();
    self.fill_from_layout(
      Category::Tower,
      |existing| if existing == 0 { (FIRST_TOWER_PRIORITY, true) } else { (TOWER_PRIORITY, false) },
      TaskReason::Tower,
      &[],
      Some((spawns.as_slice(), 2, 4)),
    );
  }

  /// A tile next to the candidate that a creep could stand on, both now
  /// and once the layout is finished.
  fn has_open_neighbor(&self, xy: RoomXY) -> bool {
    surrounding_xy(xy).any(|n| {
      self.snapshot.is_passable(n)
        && self.planned(n).map_or(true, Category::walkable)
        && !self.tasks.iter().any(|task| task.xy == n && !task.category.walkable())
    })
  }

  fn reachable(&self, xy: RoomXY) -> bool {
    !search(&self.grid, self.layout.anchor, xy, 1, EXTENSION_REACH_OPS).incomplete
  }

  fn extensions(&mut self) {
    let anchor = self.layout.anchor;
    for radius in CORE_RADIUS + 1..=EXTENSION_SEARCH_RADIUS {
      for xy in ring_around(anchor, radius).collect::<Vec<_>>() {
        if self.remaining(Category::Extension) == 0 {
          return;
        }
        let usable = match self.planned(xy) {
          Some(Category::Extension) => self.slot_usable(Category::Extension, xy),
          Some(_) => false,
          None => edge_distance(xy) >= 2
            && !self.snapshot.is_wall(xy)
            && !self.snapshot.is_feature(xy)
            && self.snapshot.is_empty_tile(xy),
        };
        if !usable || self.snapshot.has_planned(xy, Category::Extension) || self.emitted.contains(&xy) {
          continue;
        }
        if !self.has_open_neighbor(xy) || !self.reachable(xy) {
          debug!("extension spot {} in {} is unreachable", xy, self.snapshot.name);
          self.unreachable += 1;
          continue;
        }
        let priority = EXTENSION_PRIORITY - radius as u32 * 10;
        self.emit(Category::Extension, xy, priority, TaskReason::Extension, &[], false);
      }
    }
  }

  fn controller_container(&mut self) {
    let Some(controller) = self.snapshot.controller else {
      return;
    };
    let has_one = band_around(controller, 1, 2)
      .any(|xy| self.snapshot.has_planned(xy, Category::Container));
    if has_one {
      return;
    }
    if let Some(xy) = self.container_spot(ring_around(controller, 2).collect()) {
      self.emit(Category::Container, xy, CONTROLLER_CONTAINER_PRIORITY, TaskReason::ControllerContainer, &[], false);
    }
  }

  fn routes(&mut self, paths: &mut PathCache, lifetime: u32) {
    let mut goals: Vec<(String, RoomXY)> = self.snapshot.sources.iter()
      .map(|source| (source_route_key(*source), *source))
      .collect();
    goals.extend(self.snapshot.controller.map(|c| (CONTROLLER_ROUTE.to_string(), c)));
    if self.snapshot.controller_level >= Category::Extractor.unlock_level().unwrap_or(u8::MAX) {
      goals.extend(self.snapshot.mineral.map(|m| (MINERAL_ROUTE.to_string(), m)));
    }

    let anchor = self.layout.anchor;
    for (key, goal) in goals {
      let Some(steps) = paths.route(&key, &self.grid, anchor, goal, 1, self.snapshot.tick, lifetime) else {
        warn!("no road route to {} in {}", key, self.snapshot.name);
        continue;
      };
      for (i, step) in steps.iter().enumerate() {
        if self.planned(step.xy).map_or(false, |c| c != Category::Road) {
          continue;
        }
        let priority = ROUTE_ROAD_PRIORITY.saturating_sub(ROUTE_DECAY * i as u32).max(ROUTE_FLOOR);
        self.emit(Category::Road, step.xy, priority, TaskReason::RouteRoad, &[], false);
      }
    }
  }

  fn singleton(&mut self, category: Category, priority: u32, reason: TaskReason, dependencies: &[Dependency]) {
    self.fill_from_layout(category, |_| (priority, false), reason, dependencies, None);
  }

  fn late_game(&mut self) {
    use Dependency::*;
    self.singleton(Category::Terminal, 500, TaskReason::LateGame, &[StorageExists]);
    if let Some(mineral) = self.snapshot.mineral {
      self.emit(Category::Extractor, mineral, 480, TaskReason::LateGame, &[StorageExists], false);
      let has_container = band_around(mineral, 1, 1)
        .any(|xy| self.snapshot.has_planned(xy, Category::Container));
      if !has_container && self.snapshot.has_planned(mineral, Category::Extractor) {
        if let Some(xy) = self.container_spot(ring_around(mineral, 1).collect()) {
          self.emit(Category::Container, xy, 470, TaskReason::MineralContainer, &[ExtractorExists], false);
        }
      }
    }
    self.singleton(Category::Lab, 460, TaskReason::LateGame, &[TerminalExists]);
    self.singleton(Category::Factory, 440, TaskReason::LateGame, &[StorageExists]);
    self.singleton(Category::PowerSpawn, 430, TaskReason::LateGame, &[TerminalExists]);
    self.singleton(Category::Nuker, 420, TaskReason::LateGame, &[TerminalExists]);
    self.singleton(Category::Observer, 410, TaskReason::LateGame, &[StorageExists]);
  }

  fn ramparts(&mut self) {
    if self.snapshot.controller_level < RAMPART_LEVEL && self.snapshot.threat == 0 {
      return;
    }
    let critical: Vec<RoomXY> = self.snapshot.structures.iter()
      .filter(|p| matches!(p.category, Category::Spawn | Category::Storage | Category::Terminal | Category::Tower))
      .map(|p| p.xy)
      .collect();
    for xy in critical {
      self.emit(Category::Rampart, xy, RAMPART_PRIORITY, TaskReason::Rampart, &[], false);
    }
  }

  fn redundant_roads(&mut self) {
    let snapshot = self.snapshot;
    if snapshot.controller_level < REDUNDANT_ROAD_LEVEL || snapshot.energy_capacity < REDUNDANT_ROAD_CAPACITY {
      return;
    }
    let anchor = self.layout.anchor;
    let lattice: Vec<RoomXY> = self.layout.slots(Category::Road).iter().copied()
      .filter(|xy| range(*xy, anchor) > CORE_RADIUS)
      .collect();
    for xy in lattice {
      self.emit(Category::Road, xy, REDUNDANT_ROAD_PRIORITY, TaskReason::RedundantRoad, &[], false);
    }
  }

  fn perimeter(&mut self) {
    if self.snapshot.controller_level < PERIMETER_LEVEL {
      return;
    }
    for category in [Category::Rampart, Category::Wall] {
      for xy in self.layout.slots(category).to_vec() {
        if self.slot_usable(category, xy) {
          self.emit(category, xy, PERIMETER_PRIORITY, TaskReason::Perimeter, &[], false);
        }
      }
    }
  }

  fn metrics(&self) -> PlanMetrics {
    let total_cost: u32 = self.tasks.iter().map(|task| task.cost).sum();
    let throughput = self.snapshot.builders.max(1) * BUILD_RATE;
    let built = self.snapshot.structures.len() as f32;
    let outstanding = (self.snapshot.sites.len() + self.tasks.len()) as f32;
    let completion = if built + outstanding == 0.0 { 1.0 } else { built / (built + outstanding) };
    PlanMetrics {
      count: self.tasks.len(),
      total_cost,
      estimated_ticks: total_cost / throughput,
      completion,
      unreachable: self.unreachable,
    }
  }
}

/// Everything that still needs building, most important first.
pub fn generate_tasks(
  snapshot: &RoomSnapshot,
  layout: &LayoutPlan,
  paths: &mut PathCache,
  path_lifetime: u32,
) -> ConstructionPlan {
  let mut generator = Generator::new(snapshot, layout);

  generator.spawns();
  generator.source_containers();
  generator.hub_roads();
  generator.towers();
  generator.extensions();
  generator.singleton(Category::Storage, STORAGE_PRIORITY, TaskReason::Core, &[]);
  generator.controller_container();
  generator.singleton(Category::Link, LINK_PRIORITY, TaskReason::Link, &[Dependency::StorageExists]);
  generator.routes(paths, path_lifetime);
  generator.late_game();
  generator.ramparts();
  generator.redundant_roads();
  generator.perimeter();

  let metrics = generator.metrics();
  let mut tasks = generator.tasks;
  // stable, so equal priorities keep the order they were generated in
  tasks.sort_by(|a, b| a.bucket.cmp(&b.bucket).then(b.priority.cmp(&a.priority)));

  debug!(
    "{} tasks for {} ({} critical), cost {}",
    metrics.count,
    snapshot.name,
    tasks.iter().filter(|t| t.bucket == Bucket::Critical).count(),
    metrics.total_cost
  );
  ConstructionPlan { tasks, metrics }
}
