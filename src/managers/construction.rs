//! Places construction sites from the task list, within budget.

use std::collections::{BTreeMap, HashSet};

use log::*;
use screeps::{Position, RoomXY};

use crate::rooms::tile_slice::range;
use super::category::Category;
use super::room_plan::LayoutPlan;
use super::snapshot::{Placed, RoomSnapshot};
use super::tasks::{Bucket, ConstructionPlan, ConstructionTask, Dependency, TaskReason};
use super::traffic::TrafficMap;

/// Sites every room gets before builders are counted.
pub const BASE_BUDGET: u32 = 2;
/// Under this much spawn energy the budget is halved.
pub const LOW_ENERGY_RATIO: f32 = 0.3;
/// With a storage built, less than this in it costs one site.
pub const LOW_RESERVE: u32 = 10_000;
/// Emergency mode kicks in under this much stored energy while it's falling.
pub const EMERGENCY_FLOOR: u32 = 5_000;
pub const EMERGENCY_SPAWNS: usize = 1;
pub const EMERGENCY_EXTENSIONS: usize = 2;
/// Below this level roads and ramparts wait for the economy.
pub const ROAD_LEVEL: u8 = 3;
pub const TRAFFIC_ROAD_LEVEL: u8 = 3;
pub const TRAFFIC_ROAD_CAP: u32 = 2;
pub const TRAFFIC_ROAD_MIN_VISITS: u32 = 10;
/// Spawn energy needed before a room counts as healthy.
pub const HEALTHY_ENERGY_RATIO: f32 = 0.5;

/// The most sites a room may place in one invocation.
pub fn budget_ceiling(level: u8) -> u32 {
  match level {
    0..=2 => 3,
    3..=4 => 5,
    5..=6 => 8,
    _ => 10,
  }
}

/// What the host said about a site request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SiteOutcome {
  Created,
  /// This tile won't take it. Move on to the next task.
  InvalidTarget,
  /// The host won't take any more sites right now.
  LimitReached,
}

/// The part of the game the executor talks to.
pub trait SiteHost {
  fn create_site(&mut self, pos: Position, category: Category) -> SiteOutcome;
  /// Tear down a built structure. Returns whether the host accepted.
  fn destroy_structure(&mut self, pos: Position, category: Category) -> bool;
  /// Remove a queued site. Returns whether the host accepted.
  fn cancel_site(&mut self, pos: Position, category: Category) -> bool;
}

/// Sites outstanding across every room, against the platform ceiling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalSites {
  pub outstanding: u32,
  pub ceiling: u32,
  /// Left free for whatever else wants to place sites.
  pub buffer: u32,
}

impl GlobalSites {
  pub fn new(outstanding: u32, ceiling: u32, buffer: u32) -> GlobalSites {
    GlobalSites { outstanding, ceiling, buffer }
  }

  pub fn remaining(&self) -> u32 {
    self.ceiling
      .saturating_sub(self.buffer)
      .saturating_sub(self.outstanding)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
  Duplicate,
  /// Roads and ramparts before the first extension and source containers.
  EconomyFirst,
  RoadQuota,
  Dependency(Dependency),
  Cap,
  Wall,
  Feature,
  NoMineral,
  Occupied(Category),
  /// A road was in the way and has been removed.
  RoadRemoved,
  Rejected,
  /// Ran out of budget before getting here.
  Budget,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionReport {
  pub placed: Vec<Placed>,
  pub roads_removed: Vec<RoomXY>,
  pub skipped: Vec<(Category, RoomXY, SkipReason)>,
  pub emergency: bool,
  pub budget: u32,
  pub road_quota: u32,
  pub global_remaining: u32,
  /// Roads placed on busy tiles the layout didn't foresee.
  pub traffic_roads: u32,
  pub limit_reached: bool,
}

impl ExecutionReport {
  pub fn placed_roads(&self) -> u32 {
    self.placed.iter().filter(|p| p.category == Category::Road).count() as u32
  }
}

pub fn is_emergency(snapshot: &RoomSnapshot) -> bool {
  snapshot.energy_stored < EMERGENCY_FLOOR && snapshot.energy_trend < 0
}

/// Strip the list down to what keeps energy flowing: source containers and
/// a few spawns and extensions.
pub fn emergency_filter<'a>(tasks: &'a [ConstructionTask]) -> Vec<&'a ConstructionTask> {
  let mut spawns = 0;
  let mut extensions = 0;
  tasks.iter()
    .filter(|task| match task.category {
      Category::Container => task.reason == TaskReason::SourceContainer,
      Category::Spawn if spawns < EMERGENCY_SPAWNS => {
        spawns += 1;
        true
      }
      Category::Extension if extensions < EMERGENCY_EXTENSIONS => {
        extensions += 1;
        true
      }
      _ => false,
    })
    .collect()
}

/// Sites this room may place this invocation.
pub fn room_budget(snapshot: &RoomSnapshot) -> u32 {
  let mut budget = BASE_BUDGET + snapshot.builders / 2;
  if snapshot.energy_ratio() < LOW_ENERGY_RATIO {
    budget /= 2;
  }
  if snapshot.built_count(Category::Storage) > 0 && snapshot.energy_stored < LOW_RESERVE {
    budget = budget.saturating_sub(1);
  }
  budget.clamp(1, budget_ceiling(snapshot.controller_level))
}

/// Whether roads and ramparts are held back until the economy exists.
pub fn roads_held_back(snapshot: &RoomSnapshot) -> bool {
  if snapshot.controller_level >= ROAD_LEVEL {
    return false;
  }
  let has_extension = snapshot.built_count(Category::Extension) > 0;
  let sources_served = snapshot.sources.iter().all(|source| {
    snapshot.structures.iter()
      .any(|p| p.category == Category::Container && range(p.xy, *source) <= 1)
  });
  !(has_extension && sources_served)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Blocker {
  Skip(SkipReason),
  /// Only a road stands in the way.
  Road { built: bool },
}

/// Whether `category` can go on `xy` right now.
fn check_tile(snapshot: &RoomSnapshot, category: Category, xy: RoomXY) -> Result<(), Blocker> {
  if snapshot.is_wall(xy) {
    return Err(Blocker::Skip(SkipReason::Wall));
  }
  if category == Category::Extractor {
    return if snapshot.mineral == Some(xy) {
      Ok(())
    } else {
      Err(Blocker::Skip(SkipReason::NoMineral))
    };
  }
  if snapshot.is_feature(xy) {
    return Err(Blocker::Skip(SkipReason::Feature));
  }

  let mut road = None;
  let built = snapshot.structures_at(xy).map(|c| (c, true));
  let queued = snapshot.sites_at(xy).map(|c| (c, false));
  for (occupant, is_built) in built.chain(queued) {
    if category.can_share_with(occupant) {
      continue;
    }
    if occupant == Category::Road && !matches!(category, Category::Road | Category::Rampart) {
      road = Some(road.unwrap_or(false) || is_built);
      continue;
    }
    return Err(Blocker::Skip(SkipReason::Occupied(occupant)));
  }
  match road {
    Some(built) => Err(Blocker::Road { built }),
    None => Ok(()),
  }
}

struct Executor<'a, H: SiteHost> {
  snapshot: &'a RoomSnapshot,
  host: &'a mut H,
  global: &'a mut GlobalSites,
  report: ExecutionReport,
  created: HashSet<(Category, RoomXY)>,
  created_counts: BTreeMap<Category, u32>,
  removed: HashSet<RoomXY>,
}

impl<'a, H: SiteHost> Executor<'a, H> {
  fn skip(&mut self, task: &ConstructionTask, reason: SkipReason) {
    trace!("skipping {:?} at {}: {:?}", task.category, task.xy, reason);
    self.report.skipped.push((task.category, task.xy, reason));
  }

  fn count(&self, category: Category) -> u32 {
    self.snapshot.total_count(category) + self.created_counts.get(&category).copied().unwrap_or(0)
  }

  /// Every check short of asking the host.
  fn vet(&self, task: &ConstructionTask) -> Result<(), Blocker> {
    if self.snapshot.has_planned(task.xy, task.category)
      || self.created.contains(&(task.category, task.xy)) {
      return Err(Blocker::Skip(SkipReason::Duplicate));
    }
    if let Some(dep) = task.unmet_dependency(self.snapshot) {
      return Err(Blocker::Skip(SkipReason::Dependency(dep)));
    }
    if self.count(task.category) >= task.category.cap(self.snapshot.controller_level) {
      return Err(Blocker::Skip(SkipReason::Cap));
    }
    if self.removed.contains(&task.xy) {
      // the road is on its way out; the tile frees up next time.
      return Err(Blocker::Skip(SkipReason::RoadRemoved));
    }
    check_tile(self.snapshot, task.category, task.xy)
  }

  fn remove_road(&mut self, task: &ConstructionTask, built: bool) {
    let pos = self.snapshot.position(task.xy);
    let accepted = if built {
      self.host.destroy_structure(pos, Category::Road)
    } else {
      self.host.cancel_site(pos, Category::Road)
    };
    if accepted {
      info!("removing road at {} for {:?}", pos, task.category);
      if !built {
        self.global.outstanding = self.global.outstanding.saturating_sub(1);
      }
      self.removed.insert(task.xy);
      self.report.roads_removed.push(task.xy);
      self.skip(task, SkipReason::RoadRemoved);
    } else {
      warn!("host refused to clear the road at {}", pos);
      self.skip(task, SkipReason::Rejected);
    }
  }

  /// Ask the host for a site. Returns false once the host is full.
  fn place(&mut self, task: &ConstructionTask) -> bool {
    let pos = self.snapshot.position(task.xy);
    match self.host.create_site(pos, task.category) {
      SiteOutcome::Created => {
        debug!("placed {:?} at {} ({:?}, {})", task.category, pos, task.reason, task.priority);
        self.created.insert((task.category, task.xy));
        *self.created_counts.entry(task.category).or_insert(0) += 1;
        self.global.outstanding += 1;
        self.report.placed.push(Placed::new(task.xy, task.category));
        true
      }
      SiteOutcome::InvalidTarget => {
        warn!("host rejected {:?} at {}", task.category, pos);
        // a tower the host won't stack on a road gets the road cleared
        let under = self.snapshot.structures_at(task.xy).map(|c| (c, true))
          .chain(self.snapshot.sites_at(task.xy).map(|c| (c, false)))
          .find(|(c, _)| *c == Category::Road);
        match under {
          Some((_, built)) if task.category == Category::Tower => self.remove_road(task, built),
          _ => self.skip(task, SkipReason::Rejected),
        }
        true
      }
      SiteOutcome::LimitReached => {
        warn!("host is out of construction sites");
        self.report.limit_reached = true;
        false
      }
    }
  }
}

/// Place as much of the plan as the budgets allow.
pub fn execute<H: SiteHost>(
  plan: &ConstructionPlan,
  snapshot: &RoomSnapshot,
  layout: &LayoutPlan,
  traffic: &TrafficMap,
  host: &mut H,
  global: &mut GlobalSites,
) -> ExecutionReport {
  let global_remaining = global.remaining();
  let emergency = is_emergency(snapshot);
  let mut report = ExecutionReport { emergency, global_remaining, ..Default::default() };
  if global_remaining == 0 {
    debug!("no construction sites left to hand out, skipping {}", snapshot.name);
    return report;
  }

  let tasks: Vec<&ConstructionTask> = if emergency {
    warn!("{} is in emergency mode, stored {} trend {}", snapshot.name, snapshot.energy_stored, snapshot.energy_trend);
    emergency_filter(&plan.tasks)
  } else {
    plan.tasks.iter().collect()
  };

  let budget = room_budget(snapshot).min(global_remaining);
  let held_back = roads_held_back(snapshot);
  report.budget = budget;

  let mut exec = Executor {
    snapshot,
    host,
    global,
    report,
    created: HashSet::new(),
    created_counts: BTreeMap::new(),
    removed: HashSet::new(),
  };

  // tally as we go so tasks competing for the last slot under a cap only
  // count once.
  let mut tallied: BTreeMap<Category, u32> = BTreeMap::new();
  let placeable_others = tasks.iter()
    .filter(|task| task.category != Category::Road)
    .filter(|task| !(held_back && task.category == Category::Rampart))
    .filter(|task| {
      if exec.vet(task).is_err() {
        return false;
      }
      let tally = tallied.entry(task.category).or_insert(0);
      if exec.count(task.category) + *tally >= task.category.cap(snapshot.controller_level) {
        return false;
      }
      *tally += 1;
      true
    })
    .count() as u32;
  let road_quota = if placeable_others == 0 {
    budget
  } else {
    budget.saturating_sub(placeable_others)
  };
  exec.report.road_quota = road_quota;

  let mut placed = 0;
  let mut roads = 0;
  let mut host_full = false;
  for task in tasks {
    if placed >= budget {
      exec.skip(task, SkipReason::Budget);
      continue;
    }
    let is_road = task.category == Category::Road;
    if held_back && matches!(task.category, Category::Road | Category::Rampart) {
      exec.skip(task, SkipReason::EconomyFirst);
      continue;
    }
    if is_road && roads >= road_quota {
      exec.skip(task, SkipReason::RoadQuota);
      continue;
    }
    match exec.vet(task) {
      Ok(()) => (),
      Err(Blocker::Skip(reason)) => {
        exec.skip(task, reason);
        continue;
      }
      Err(Blocker::Road { built }) => {
        exec.remove_road(task, built);
        continue;
      }
    }
    let before = exec.report.placed.len();
    if !exec.place(task) {
      host_full = true;
      break;
    }
    if exec.report.placed.len() > before {
      placed += 1;
      if is_road {
        roads += 1;
      }
    }
  }

  let healthy = !emergency
    && snapshot.energy_ratio() >= HEALTHY_ENERGY_RATIO
    && snapshot.energy_trend >= 0;
  if !host_full && placed < budget && healthy && snapshot.controller_level >= TRAFFIC_ROAD_LEVEL {
    let reserved = layout.reserved();
    let wanted = TRAFFIC_ROAD_CAP.min(budget - placed) as usize;
    let hot = traffic.hottest(wanted, TRAFFIC_ROAD_MIN_VISITS, |xy| {
      reserved.contains(&xy)
        || snapshot.is_wall(xy)
        || snapshot.is_feature(xy)
        || !snapshot.is_empty_tile(xy)
    });
    for xy in hot {
      let task = ConstructionTask {
        category: Category::Road,
        xy,
        priority: 0,
        reason: TaskReason::RouteRoad,
        cost: Category::Road.build_cost(),
        dependencies: Vec::new(),
        urgent: false,
        bucket: Bucket::Deferred,
      };
      if exec.vet(&task).is_err() {
        continue;
      }
      let before = exec.report.placed.len();
      if !exec.place(&task) {
        break;
      }
      if exec.report.placed.len() > before {
        exec.report.traffic_roads += 1;
      }
    }
  }

  let report = exec.report;
  debug!(
    "{}: placed {} of budget {} (roads {}/{}), removed {} roads",
    snapshot.name,
    report.placed.len(),
    report.budget,
    report.placed_roads(),
    report.road_quota,
    report.roads_removed.len()
  );
  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use enum_iterator::all;
  use crate::managers::path_cache::PathCache;
  use crate::managers::room_plan::generate_layout;
  use crate::managers::tasks::generate_tasks;
  use crate::managers::testing::*;

  fn run(snapshot: &RoomSnapshot, host: &mut FakeHost, global: &mut GlobalSites) -> ExecutionReport {
    let layout = generate_layout(snapshot, at(25, 25));
    let plan = generate_tasks(snapshot, &layout, &mut PathCache::new(), 1500);
    execute(&plan, snapshot, &layout, &TrafficMap::new(0), host, global)
  }

  fn roomy() -> GlobalSites {
    GlobalSites::new(0, 100, 10)
  }

  fn base() -> SnapshotBuilder {
    SnapshotBuilder::open()
      .controller(at(25, 8))
      .source(at(8, 25))
  }

  /// A room at level 3 with its economy in place, so roads are allowed.
  fn developed() -> SnapshotBuilder {
    base()
      .level(3)
      .energy(800, 800)
      .structure(at(24, 25), Category::Spawn)
      .structure(at(9, 25), Category::Container)
  }

  #[test]
  fn fresh_level_one_room() {
    let snapshot = base().level(1).build();
    let mut host = FakeHost::new();
    let report = run(&snapshot, &mut host, &mut roomy());
    assert!(report.placed.len() as u32 <= BASE_BUDGET);
    assert!(report.placed.iter().all(|p| !matches!(p.category, Category::Extension | Category::Tower)));
    assert!(report.placed.iter().any(|p| p.category == Category::Spawn));
    // roads wait for the economy below level 3
    assert!(report.placed.iter().all(|p| p.category != Category::Road));
  }

  #[test]
  fn caps_hold_across_invocations() {
    let mut snapshot = developed().builders(12).build();
    let mut host = FakeHost::new();
    let mut global = roomy();
    for tick in 0..20 {
      snapshot.tick = tick;
      run(&snapshot, &mut host, &mut global);
      host.apply(&mut snapshot);
      for category in all::<Category>() {
        assert!(
          snapshot.total_count(category) <= category.cap(snapshot.controller_level),
          "{:?} over cap", category
        );
      }
    }
    assert_eq!(snapshot.total_count(Category::Extension), 10);
  }

  #[test]
  fn roads_stay_under_quota_while_other_work_is_placeable() {
    let mut snapshot = developed().builders(4).build();
    let mut host = FakeHost::new();
    let mut global = roomy();
    for tick in 0..10 {
      snapshot.tick = tick;
      let report = run(&snapshot, &mut host, &mut global);
      let others_left = report.placed.len() as u32 > report.placed_roads()
        || report.skipped.iter().any(|(c, _, r)| *c != Category::Road && *r == SkipReason::Budget);
      if others_left {
        assert!(report.placed_roads() <= report.road_quota);
      }
      host.apply(&mut snapshot);
    }
  }

  #[test]
  fn quota_is_the_whole_budget_with_only_roads_left() {
    let snapshot = developed().build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let mut plan = generate_tasks(&snapshot, &layout, &mut PathCache::new(), 1500);
    plan.tasks.retain(|t| t.category == Category::Road);
    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert_eq!(report.road_quota, report.budget);
    assert_eq!(report.placed_roads(), report.budget);
  }

  #[test]
  fn emergency_keeps_only_the_essentials() {
    let snapshot = developed()
      .level(4)
      .energy(1300, 1300)
      .stored(1000, -50)
      .builders(20)
      .build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let plan = generate_tasks(&snapshot, &layout, &mut PathCache::new(), 1500);
    let filtered = emergency_filter(&plan.tasks);
    assert!(filtered.iter().all(|t| match t.category {
      Category::Container => t.reason == TaskReason::SourceContainer,
      Category::Spawn | Category::Extension => true,
      _ => false,
    }));
    assert!(filtered.iter().filter(|t| t.category == Category::Extension).count() <= EMERGENCY_EXTENSIONS);

    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert!(report.emergency);
    assert!(report.placed.iter().all(|p| matches!(p.category, Category::Extension | Category::Container | Category::Spawn)));
    assert!(report.placed.len() <= 3);
  }

  #[test]
  fn falling_but_rich_rooms_are_not_in_emergency() {
    let snapshot = developed().stored(50_000, -500).build();
    assert!(!is_emergency(&snapshot));
  }

  #[test]
  fn road_in_the_way_is_removed_then_replaced() {
    let snapshot = developed().build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let target = layout.slots(Category::Extension)[0];
    let mut snapshot = developed().structure(target, Category::Road).build();

    let mut host = FakeHost::new();
    let report = run(&snapshot, &mut host, &mut roomy());
    assert_eq!(report.roads_removed, vec![target]);
    assert_eq!(host.destroyed, vec![target]);
    assert!(report.placed.iter().all(|p| p.xy != target));

    host.apply(&mut snapshot);
    let report = run(&snapshot, &mut host, &mut roomy());
    assert!(report.placed.contains(&Placed::new(target, Category::Extension)));
  }

  #[test]
  fn queued_road_in_the_way_is_cancelled() {
    let snapshot = developed().build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let target = layout.slots(Category::Extension)[0];
    let snapshot = developed().site(target, Category::Road).build();
    let mut host = FakeHost::new();
    let mut global = GlobalSites::new(5, 100, 10);
    run(&snapshot, &mut host, &mut global);
    assert_eq!(host.cancelled, vec![target]);
    assert!(host.destroyed.is_empty());
  }

  #[test]
  fn rejected_tower_clears_its_road() {
    let snapshot = developed().build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let tower = layout.slots(Category::Tower)[0];
    let snapshot = developed().structure(tower, Category::Road).build();
    let mut host = FakeHost::new().reject(tower);
    let report = run(&snapshot, &mut host, &mut roomy());
    assert_eq!(report.roads_removed, vec![tower]);
  }

  #[test]
  fn nothing_placed_at_the_global_ceiling() {
    let snapshot = developed().builders(10).build();
    let mut host = FakeHost::new();
    let mut global = GlobalSites::new(90, 100, 10);
    let report = run(&snapshot, &mut host, &mut global);
    assert_eq!(report.global_remaining, 0);
    assert!(report.placed.is_empty());
    assert!(host.created.is_empty());
  }

  #[test]
  fn global_remainder_limits_the_budget() {
    let snapshot = developed().builders(10).build();
    let mut host = FakeHost::new();
    let mut global = GlobalSites::new(88, 100, 10);
    let report = run(&snapshot, &mut host, &mut global);
    assert_eq!(report.placed.len(), 2);
    assert_eq!(global.outstanding, 90);
  }

  #[test]
  fn host_limit_stops_the_loop() {
    let snapshot = developed().builders(10).build();
    let mut host = FakeHost::new().limit(1);
    let report = run(&snapshot, &mut host, &mut roomy());
    assert_eq!(report.placed.len(), 1);
    assert!(report.limit_reached);
  }

  #[test]
  fn budget_scales_with_builders_and_energy() {
    assert_eq!(room_budget(&developed().builders(0).build()), 2);
    assert_eq!(room_budget(&developed().builders(4).build()), 4);
    assert_eq!(room_budget(&developed().builders(40).build()), budget_ceiling(3));
    assert_eq!(room_budget(&developed().builders(4).energy(100, 800).build()), 2);
    let low_reserve = developed().level(4).builders(4).structure(at(25, 26), Category::Storage).stored(500, 0).build();
    assert_eq!(room_budget(&low_reserve), 3);
    assert_eq!(room_budget(&developed().energy(0, 800).build()), 1);
  }

  #[test]
  fn dependencies_hold_back_links() {
    let snapshot = developed().level(5).energy(1800, 1800).build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let mut plan = generate_tasks(&snapshot, &layout, &mut PathCache::new(), 1500);
    plan.tasks.retain(|t| t.category == Category::Link);
    assert!(!plan.is_empty());
    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert!(report.placed.iter().all(|p| p.category != Category::Link));
    assert!(report.skipped.iter().any(|(c, _, r)| {
      *c == Category::Link && *r == SkipReason::Dependency(Dependency::StorageExists)
    }));
  }

  #[test]
  fn busy_tiles_get_roads_once_the_list_is_done() {
    let snapshot = developed().builders(10).build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let mut traffic = TrafficMap::new(0);
    for _ in 0..30 {
      traffic.record(at(40, 30));
      traffic.record(at(41, 30));
      traffic.record(at(42, 30));
    }
    let plan = ConstructionPlan::default();
    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &traffic, &mut host, &mut roomy());
    assert_eq!(report.traffic_roads, TRAFFIC_ROAD_CAP);
    assert!(report.placed.iter().all(|p| p.category == Category::Road && range(p.xy, at(41, 30)) <= 1));
  }

  #[test]
  fn stacking_and_mineral_checks() {
    let snapshot = developed()
      .mineral(at(40, 10))
      .structure(at(30, 30), Category::Road)
      .structure(at(31, 30), Category::Extension)
      .build();
    assert_eq!(check_tile(&snapshot, Category::Container, at(30, 30)), Ok(()));
    assert_eq!(check_tile(&snapshot, Category::Rampart, at(31, 30)), Ok(()));
    assert_eq!(
      check_tile(&snapshot, Category::Spawn, at(31, 30)),
      Err(Blocker::Skip(SkipReason::Occupied(Category::Extension)))
    );
    assert_eq!(check_tile(&snapshot, Category::Lab, at(30, 30)), Err(Blocker::Road { built: true }));
    assert_eq!(check_tile(&snapshot, Category::Extractor, at(40, 10)), Ok(()));
    assert_eq!(check_tile(&snapshot, Category::Extractor, at(41, 10)), Err(Blocker::Skip(SkipReason::NoMineral)));
    assert_eq!(check_tile(&snapshot, Category::Road, at(40, 10)), Err(Blocker::Skip(SkipReason::Feature)));
  }

  fn task(category: Category, xy: RoomXY) -> ConstructionTask {
    ConstructionTask {
      category,
      xy,
      priority: 500,
      reason: TaskReason::RouteRoad,
      cost: category.build_cost(),
      dependencies: Vec::new(),
      urgent: false,
      bucket: Bucket::Normal,
    }
  }

  fn busy_traffic() -> TrafficMap {
    let mut traffic = TrafficMap::new(0);
    for _ in 0..30 {
      traffic.record(at(40, 30));
      traffic.record(at(41, 30));
    }
    traffic
  }

  #[test]
  fn struggling_rooms_get_no_traffic_roads() {
    let snapshot = developed().builders(10).build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let plan = ConstructionPlan::default();
    let unhealthy = [
      developed().builders(10).energy(200, 800).build(),
      developed().builders(10).stored(20_000, -10).build(),
      base().level(2).energy(550, 550).builders(10).build(),
    ];
    for snapshot in &unhealthy {
      let mut host = FakeHost::new();
      let report = execute(&plan, snapshot, &layout, &busy_traffic(), &mut host, &mut roomy());
      assert_eq!(report.traffic_roads, 0);
      assert!(report.placed.is_empty());
      assert!(host.created.is_empty());
    }
  }

  #[test]
  fn ramparts_wait_for_the_economy() {
    let snapshot = base().level(2).build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let mut plan = ConstructionPlan::default();
    plan.tasks = vec![task(Category::Rampart, at(28, 28))];
    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert!(report.placed.is_empty());
    assert_eq!(report.skipped, vec![(Category::Rampart, at(28, 28), SkipReason::EconomyFirst)]);

    let served = base()
      .level(2)
      .structure(at(30, 30), Category::Extension)
      .structure(at(9, 25), Category::Container)
      .build();
    let report = execute(&plan, &served, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert_eq!(report.placed, vec![Placed::new(at(28, 28), Category::Rampart)]);
  }

  #[test]
  fn tasks_racing_for_one_cap_slot_count_once_against_the_quota() {
    let snapshot = base()
      .level(3)
      .energy(800, 800)
      .structure(at(9, 25), Category::Container)
      .build();
    let layout = generate_layout(&snapshot, at(25, 25));
    let mut plan = ConstructionPlan::default();
    plan.tasks = vec![
      task(Category::Spawn, at(30, 30)),
      task(Category::Spawn, at(32, 30)),
      task(Category::Road, at(30, 35)),
      task(Category::Road, at(31, 35)),
    ];
    let mut host = FakeHost::new();
    let report = execute(&plan, &snapshot, &layout, &TrafficMap::new(0), &mut host, &mut roomy());
    assert_eq!(report.budget, 2);
    assert_eq!(report.road_quota, 1);
    assert_eq!(report.placed, vec![
      Placed::new(at(30, 30), Category::Spawn),
      Placed::new(at(30, 35), Category::Road),
    ]);
    assert!(report.skipped.contains(&(Category::Spawn, at(32, 30), SkipReason::Cap)));
  }
}
