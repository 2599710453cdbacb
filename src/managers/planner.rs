//! Runs the whole pipeline for one room and keeps its records.

use log::*;
use persist_memory::Persist;
use screeps::{RoomName, RoomXY};

use crate::storage::{load, save, RecordKind, Repository};
use super::anchor::{resolve_anchor, Anchor};
use super::construction::{execute, ExecutionReport, GlobalSites, SiteHost};
use super::error::PlanningError;
use super::path_cache::PathCache;
use super::room_plan::{check_layout, generate_layout, LayoutPlan, LayoutRecord, LayoutStale};
use super::snapshot::RoomSnapshot;
use super::tasks::{generate_tasks, PlanMetrics};
use super::traffic::TrafficMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlannerConfig {
  /// Ticks a layout is trusted before it's regenerated.
  pub layout_lifetime: u32,
  pub path_lifetime: u32,
  pub path_cache_size: usize,
  /// Construction sites the platform allows across all rooms.
  pub site_ceiling: u32,
  pub site_buffer: u32,
  pub traffic_decay_period: u32,
}

impl Default for PlannerConfig {
  fn default() -> Self {
    PlannerConfig {
      layout_lifetime: 10_000,
      path_lifetime: 1_500,
      path_cache_size: 64,
      site_ceiling: 100,
      site_buffer: 10,
      traffic_decay_period: 1_000,
    }
  }
}

/// Where this invocation's layout came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutSource {
  Cached,
  Generated(LayoutStale),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedRoom {
  pub anchor: RoomXY,
  pub fresh_anchor: bool,
  pub layout: LayoutSource,
  pub metrics: PlanMetrics,
  pub execution: ExecutionReport,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoomReport {
  Planned(PlannedRoom),
  /// Nothing to plan around this time; try again next invocation.
  Deferred(PlanningError),
}

pub struct BasePlanner<R: Repository> {
  repo: R,
  config: PlannerConfig,
}

impl<R: Repository> BasePlanner<R> {
  pub fn new(repo: R, config: PlannerConfig) -> BasePlanner<R> {
    BasePlanner { repo, config }
  }

  pub fn repo(&self) -> &R {
    &self.repo
  }

  pub fn repo_mut(&mut self) -> &mut R {
    &mut self.repo
  }

  /// Fresh sites budget for a tick, given what's already out there.
  pub fn global_sites(&self, outstanding: u32) -> GlobalSites {
    GlobalSites::new(outstanding, self.config.site_ceiling, self.config.site_buffer)
  }

  /// Flag a room so its layout is regenerated next time it runs.
  pub fn request_replan(&mut self, room: RoomName) {
    self.repo.set(room, RecordKind::ReplanRequested, vec![1]);
  }

  /// Load a record and revive it, treating anything unreadable as absent.
  fn load_revived<T: Persist>(&self, room: RoomName, kind: RecordKind, ctx: T::Context) -> Option<T>
  where T::Persisted: for<'b> minicbor::Decode<'b, ()> {
    match load::<T::Persisted>(&self.repo, room, kind) {
      Ok(Some(stored)) => match T::revive(stored, ctx) {
        Ok(value) => Some(value),
        Err(err) => {
          warn!("dropping {kind} record for {room}: {err}");
          None
        }
      },
      Ok(None) => None,
      Err(err) => {
        warn!("could not read {kind} record for {room}: {err}");
        None
      }
    }
  }

  fn store<T: Persist>(&mut self, room: RoomName, kind: RecordKind, value: &T)
  where T::Persisted: minicbor::Encode<()> {
    if let Err(err) = save(&mut self.repo, room, kind, &value.to_persist()) {
      warn!("could not write {kind} record for {room}: {err}");
    }
  }

  fn traffic(&self, room: RoomName, now: u32) -> TrafficMap {
    self.load_revived::<TrafficMap>(room, RecordKind::Traffic, ())
      .unwrap_or_else(|| TrafficMap::new(now))
  }

  /// Count creeps standing on these tiles this tick.
  pub fn record_traffic(&mut self, room: RoomName, now: u32, visits: impl IntoIterator<Item = RoomXY>) {
    let mut traffic = self.traffic(room, now);
    for xy in visits {
      traffic.record(xy);
    }
    self.store(room, RecordKind::Traffic, &traffic);
  }

  fn layout(&mut self, snapshot: &RoomSnapshot, anchor: RoomXY) -> (LayoutPlan, LayoutSource) {
    let room = snapshot.name;
    let replan = self.repo.contains(room, RecordKind::ReplanRequested);
    let checked = match load::<LayoutRecord>(&self.repo, room, RecordKind::Layout) {
      Ok(record) => check_layout(record, room, anchor, snapshot.tick, self.config.layout_lifetime, replan),
      Err(err) => {
        warn!("stored layout for {room} doesn't decode: {err}");
        Err(LayoutStale::Corrupt)
      }
    };
    match checked {
      Ok(plan) => (plan, LayoutSource::Cached),
      Err(reason) => {
        info!("regenerating layout for {room}: {reason:?}");
        let plan = generate_layout(snapshot, anchor);
        self.store(room, RecordKind::Layout, &plan);
        if replan {
          self.repo.delete(room, RecordKind::ReplanRequested);
        }
        (plan, LayoutSource::Generated(reason))
      }
    }
  }

  /// Plan and build for one room. Every failure in here is logged and
  /// handled; the report says what happened.
  pub fn run_room(
    &mut self,
    snapshot: &RoomSnapshot,
    host: &mut impl SiteHost,
    global: &mut GlobalSites,
  ) -> RoomReport {
    let room = snapshot.name;
    if snapshot.controller.is_none() {
      let err = PlanningError::NoController(room);
      warn!("{err}");
      return RoomReport::Deferred(err);
    }

    let stored = self.load_revived::<Anchor>(room, RecordKind::Anchor, ());
    let (anchor, fresh_anchor) = match resolve_anchor(snapshot, stored) {
      Ok(resolved) => resolved,
      Err(err) => {
        warn!("deferring planning: {err}");
        return RoomReport::Deferred(err);
      }
    };
    if fresh_anchor {
      self.store(room, RecordKind::Anchor, &anchor);
    }

    let (layout, layout_source) = self.layout(snapshot, anchor.xy);

    let mut paths = self.load_revived::<PathCache>(room, RecordKind::PathCache, ())
      .unwrap_or_default();
    let mut traffic = self.traffic(room, snapshot.tick);
    if traffic.maybe_decay(snapshot.tick, self.config.traffic_decay_period) {
      debug!("decayed traffic for {room}, {} tiles left", traffic.len());
    }

    let plan = generate_tasks(snapshot, &layout, &mut paths, self.config.path_lifetime);
    let execution = execute(&plan, snapshot, &layout, &traffic, host, global);

    let pruned = paths.prune(self.config.path_cache_size);
    if pruned > 0 {
      debug!("pruned {pruned} routes for {room}");
    }
    self.store(room, RecordKind::PathCache, &paths);
    self.store(room, RecordKind::Traffic, &traffic);

    info!(
      "{room}: anchor {} layout {:?}, {} tasks, placed {} of {}{}",
      anchor.xy,
      layout_source,
      plan.metrics.count,
      execution.placed.len(),
      execution.budget,
      if execution.emergency { " (emergency)" } else { "" }
    );

    RoomReport::Planned(PlannedRoom {
      anchor: anchor.xy,
      fresh_anchor,
      layout: layout_source,
      metrics: plan.metrics,
      execution,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::managers::room_plan::LAYOUT_VERSION;
  use crate::managers::testing::*;
  use crate::storage::MemoryRepository;

  fn planner() -> BasePlanner<MemoryRepository> {
    BasePlanner::new(MemoryRepository::new(), PlannerConfig::default())
  }

  fn room() -> SnapshotBuilder {
    SnapshotBuilder::open()
      .controller(at(25, 8))
      .source(at(8, 25))
      .source(at(42, 40))
  }

  fn planned(report: RoomReport) -> PlannedRoom {
    match report {
      RoomReport::Planned(planned) => planned,
      RoomReport::Deferred(err) => panic!("deferred: {err}"),
    }
  }

  #[test]
  fn first_run_generates_then_reuses() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    let snapshot = room().tick(100).build();

    let first = planned(planner.run_room(&snapshot, &mut host, &mut global));
    assert!(first.fresh_anchor);
    assert_eq!(first.layout, LayoutSource::Generated(LayoutStale::Missing));

    let snapshot = room().tick(101).build();
    let second = planned(planner.run_room(&snapshot, &mut host, &mut global));
    assert!(!second.fresh_anchor);
    assert_eq!(second.anchor, first.anchor);
    assert_eq!(second.layout, LayoutSource::Cached);
  }

  #[test]
  fn old_layouts_expire() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    planner.run_room(&room().tick(100).build(), &mut host, &mut global);
    let report = planned(planner.run_room(&room().tick(10_200).build(), &mut host, &mut global));
    assert_eq!(report.layout, LayoutSource::Generated(LayoutStale::Expired { age: 10_100 }));
  }

  #[test]
  fn replan_flag_is_honoured_once() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    let first = planned(planner.run_room(&room().tick(5).build(), &mut host, &mut global));
    planner.request_replan(test_room());
    let report = planned(planner.run_room(&room().tick(6).build(), &mut host, &mut global));
    assert_eq!(report.layout, LayoutSource::Generated(LayoutStale::ReplanRequested));
    // the anchor stays put
    assert_eq!(report.anchor, first.anchor);
    assert!(!planner.repo().contains(test_room(), RecordKind::ReplanRequested));
    let report = planned(planner.run_room(&room().tick(7).build(), &mut host, &mut global));
    assert_eq!(report.layout, LayoutSource::Cached);
  }

  #[test]
  fn version_bump_regenerates() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    planner.run_room(&room().tick(5).build(), &mut host, &mut global);
    let mut record: LayoutRecord = load(planner.repo(), test_room(), RecordKind::Layout)
      .expect("decode")
      .expect("stored");
    record.version = LAYOUT_VERSION + 1;
    save(planner.repo_mut(), test_room(), RecordKind::Layout, &record).expect("save");
    let report = planned(planner.run_room(&room().tick(6).build(), &mut host, &mut global));
    assert_eq!(report.layout, LayoutSource::Generated(LayoutStale::Version(LAYOUT_VERSION + 1)));
  }

  #[test]
  fn garbage_layout_is_regenerated() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    planner.run_room(&room().tick(5).build(), &mut host, &mut global);
    planner.repo_mut().set(test_room(), RecordKind::Layout, vec![0xff, 0x00, 0x13]);
    let report = planned(planner.run_room(&room().tick(6).build(), &mut host, &mut global));
    assert_eq!(report.layout, LayoutSource::Generated(LayoutStale::Corrupt));
  }

  #[test]
  fn walled_room_is_deferred_not_fatal() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    let snapshot = SnapshotBuilder::walled().controller(at(25, 8)).build();
    let report = planner.run_room(&snapshot, &mut host, &mut global);
    assert_eq!(report, RoomReport::Deferred(PlanningError::NoAnchor(test_room())));
    assert!(host.created.is_empty());
  }

  #[test]
  fn rooms_without_a_controller_are_skipped() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    let report = planner.run_room(&SnapshotBuilder::open().build(), &mut host, &mut global);
    assert_eq!(report, RoomReport::Deferred(PlanningError::NoController(test_room())));
  }

  #[test]
  fn routes_survive_between_invocations() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    planner.run_room(&room().level(2).tick(5).build(), &mut host, &mut global);
    let paths: PathCache = planner.load_revived(test_room(), RecordKind::PathCache, ())
      .expect("stored paths");
    // both sources and the controller
    assert_eq!(paths.len(), 3);
  }

  #[test]
  fn traffic_is_recorded_and_decayed() {
    let mut planner = planner();
    for _ in 0..5 {
      planner.record_traffic(test_room(), 0, [at(30, 40)]);
    }
    let traffic = planner.traffic(test_room(), 0);
    assert_eq!(traffic.count(at(30, 40)), 5);

    let mut host = FakeHost::new();
    let mut global = planner.global_sites(0);
    planner.run_room(&room().tick(1000).build(), &mut host, &mut global);
    assert_eq!(planner.traffic(test_room(), 1000).count(at(30, 40)), 2);
  }

  #[test]
  fn sites_from_one_room_count_against_the_next() {
    let mut planner = planner();
    let mut host = FakeHost::new();
    let mut global = planner.global_sites(87);
    let first = planned(planner.run_room(&room().level(3).energy(800, 800).builders(6).build(), &mut host, &mut global));
    assert_eq!(first.execution.placed.len(), 3);
    let mut other = room().level(3).energy(800, 800).builders(6).build();
    other.name = RoomName::new("W2N1").expect("room name");
    let second = planned(planner.run_room(&other, &mut host, &mut global));
    assert!(second.execution.placed.is_empty());
    assert_eq!(second.execution.global_remaining, 0);
  }
}
