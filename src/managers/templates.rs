//! The fixed shapes every base is stamped from.
//!
//! Each entry says where one category goes relative to the anchor. Entries
//! are applied top to bottom and earlier entries win any tile they share
//! with later ones, so the order here is the placement priority.

use screeps::RoomXY;

use crate::rooms::tile_slice::*;
use super::category::Category;

/// Radius of the hub: anchor, the cross of core singletons and the road
/// ring around them.
pub const CORE_RADIUS: u8 = 2;
/// Extension rings run from just outside the core to this radius.
pub const EXTENSION_OUTER_RADIUS: u8 = 7;
pub const PERIMETER_RADIUS: u8 = 9;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
  Any,
  /// Offsets whose `dx + dy` is even.
  Even,
  Odd,
}

impl Parity {
  fn accepts(self, (dx, dy): (i8, i8)) -> bool {
    let even = (dx as i16 + dy as i16).rem_euclid(2) == 0;
    match self {
      Parity::Any => true,
      Parity::Even => even,
      Parity::Odd => !even,
    }
  }
}

/// Something in the room a category is placed next to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Feature {
  /// The planned storage slot.
  Storage,
  Controller,
  /// Each source gets its own group.
  Sources,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
  /// Fixed offsets from the anchor.
  Offsets(&'static [(i8, i8)]),
  /// Chessboard rings between two radii, filtered by offset parity.
  Rings { inner: u8, outer: u8, parity: Parity },
  /// Offsets shifted as a block.
  Block { origin: (i8, i8), offsets: &'static [(i8, i8)] },
  /// The six corners of a hexagon.
  Hexagon { radius: u8 },
  /// Tiles in a range band around a feature, closest ring first.
  NearFeature { feature: Feature, min: u8, max: u8 },
  /// A square ring. Gates are the openings on the axes and diagonals,
  /// `gates: false` yields everything else.
  Perimeter { radius: u8, gates: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TemplateEntry {
  pub category: Category,
  pub shape: Shape,
  /// How many slots to keep from each group of candidates.
  pub per_group: Option<usize>,
}

const fn entry(category: Category, shape: Shape) -> TemplateEntry {
  TemplateEntry { category, shape, per_group: None }
}

const fn limited(category: Category, shape: Shape, per_group: usize) -> TemplateEntry {
  TemplateEntry { category, shape, per_group: Some(per_group) }
}

const HUB_ROADS: &[(i8, i8)] = &[(0, 0), (-1, -1), (1, -1), (1, 1), (-1, 1)];
const SPAWNS: &[(i8, i8)] = &[(-1, 0), (0, -1), (-2, -2)];

/// 4x4 block with its diagonal left for a road; the two corners that
/// wouldn't touch that road are dropped too.
const LAB_BLOCK: &[(i8, i8)] = &[
  (1, 0), (2, 0),
  (0, 1), (2, 1), (3, 1),
  (0, 2), (1, 2), (3, 2),
  (1, 3), (2, 3),
];
const LAB_ROADS: &[(i8, i8)] = &[(0, 0), (1, 1), (2, 2), (3, 3)];
const LAB_ORIGIN: (i8, i8) = (3, 3);

pub const LAYOUT_TEMPLATES: &[TemplateEntry] = &[
  entry(Category::Road, Shape::Offsets(HUB_ROADS)),
  entry(Category::Storage, Shape::Offsets(&[(0, 1)])),
  entry(Category::Terminal, Shape::Offsets(&[(1, 0)])),
  entry(Category::Spawn, Shape::Offsets(SPAWNS)),
  entry(Category::Road, Shape::Rings { inner: CORE_RADIUS, outer: CORE_RADIUS, parity: Parity::Any }),
  entry(Category::Tower, Shape::Hexagon { radius: 4 }),
  entry(Category::Lab, Shape::Block { origin: LAB_ORIGIN, offsets: LAB_BLOCK }),
  entry(Category::Road, Shape::Block { origin: LAB_ORIGIN, offsets: LAB_ROADS }),
  entry(Category::Factory, Shape::Offsets(&[(3, -1)])),
  entry(Category::PowerSpawn, Shape::Offsets(&[(-3, -1)])),
  entry(Category::Nuker, Shape::Offsets(&[(0, -4)])),
  entry(Category::Observer, Shape::Offsets(&[(0, 4)])),
  limited(Category::Link, Shape::NearFeature { feature: Feature::Storage, min: 1, max: 2 }, 1),
  limited(Category::Link, Shape::NearFeature { feature: Feature::Controller, min: 2, max: 3 }, 1),
  limited(Category::Link, Shape::NearFeature { feature: Feature::Sources, min: 2, max: 2 }, 1),
  limited(Category::Extension, Shape::Rings {
    inner: CORE_RADIUS + 1,
    outer: EXTENSION_OUTER_RADIUS,
    parity: Parity::Odd,
  }, 60),
  entry(Category::Road, Shape::Rings {
    inner: CORE_RADIUS + 1,
    outer: EXTENSION_OUTER_RADIUS,
    parity: Parity::Even,
  }),
  entry(Category::Rampart, Shape::Perimeter { radius: PERIMETER_RADIUS, gates: true }),
  entry(Category::Wall, Shape::Perimeter { radius: PERIMETER_RADIUS, gates: false }),
];

pub fn hexagon_offsets(radius: u8) -> Vec<(i8, i8)> {
  (0..6).map(|k| {
    let angle = (k as f32) * std::f32::consts::PI / 3.0;
    let r = radius as f32;
    ((r * angle.cos()).round() as i8, (r * angle.sin()).round() as i8)
  }).collect()
}

fn is_gate((dx, dy): (i8, i8)) -> bool {
  dx.abs() <= 1 || dy.abs() <= 1 || dx.abs() == dy.abs()
}

/// Where the feature sits for a `NearFeature` shape, one entry per group.
pub struct FeatureSpots<'a> {
  pub storage: Option<RoomXY>,
  pub controller: Option<RoomXY>,
  pub sources: &'a [RoomXY],
}

impl Shape {
  /// Candidate tiles for this shape, in preference order and grouped.
  /// Out-of-room tiles are already dropped.
  pub fn candidates(&self, anchor: RoomXY, spots: &FeatureSpots) -> Vec<Vec<RoomXY>> {
    let around = |offsets: Vec<(i8, i8)>| -> Vec<RoomXY> {
      offsets.into_iter().filter_map(|delta| offset(anchor, delta)).collect()
    };
    match *self {
      Shape::Offsets(offsets) => vec![around(offsets.to_vec())],
      Shape::Rings { inner, outer, parity } => {
        let offsets = (inner..=outer)
          .flat_map(ring_offsets)
          .filter(|delta| parity.accepts(*delta))
          .collect();
        vec![around(offsets)]
      }
      Shape::Block { origin: (ox, oy), offsets } => {
        let shifted = offsets.iter().map(|(dx, dy)| (ox + dx, oy + dy)).collect();
        vec![around(shifted)]
      }
      Shape::Hexagon { radius } => vec![around(hexagon_offsets(radius))],
      Shape::NearFeature { feature, min, max } => {
        let centers: Vec<RoomXY> = match feature {
          Feature::Storage => spots.storage.into_iter().collect(),
          Feature::Controller => spots.controller.into_iter().collect(),
          Feature::Sources => spots.sources.to_vec(),
        };
        centers.into_iter()
          .map(|center| band_around(center, min, max).collect())
          .collect()
      }
      Shape::Perimeter { radius, gates } => {
        let offsets = ring_offsets(radius)
          .into_iter()
          .filter(|delta| is_gate(*delta) == gates)
          .collect();
        vec![around(offsets)]
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn hexagon_has_six_distinct_corners() {
    let corners = hexagon_offsets(4);
    assert_eq!(corners, vec![(4, 0), (2, 3), (-2, 3), (-4, 0), (-2, -3), (2, -3)]);
  }

  #[test]
  fn extension_rings_alternate_with_road_rings() {
    let anchor = xy(25, 25).expect("valid");
    let spots = FeatureSpots { storage: None, controller: None, sources: &[] };
    let odd = Shape::Rings { inner: 3, outer: 4, parity: Parity::Odd };
    let even = Shape::Rings { inner: 3, outer: 4, parity: Parity::Even };
    let odd: HashSet<RoomXY> = odd.candidates(anchor, &spots).concat().into_iter().collect();
    let even: HashSet<RoomXY> = even.candidates(anchor, &spots).concat().into_iter().collect();
    assert_eq!(odd.len(), 28);
    assert_eq!(even.len(), 28);
    assert!(odd.is_disjoint(&even));
  }

  #[test]
  fn perimeter_splits_into_gates_and_walls() {
    let anchor = xy(25, 25).expect("valid");
    let spots = FeatureSpots { storage: None, controller: None, sources: &[] };
    let gates = Shape::Perimeter { radius: 9, gates: true }.candidates(anchor, &spots).concat();
    let walls = Shape::Perimeter { radius: 9, gates: false }.candidates(anchor, &spots).concat();
    assert_eq!(gates.len() + walls.len(), 72);
    // three wide openings on each side plus the four corners
    assert_eq!(gates.len(), 16);
  }

  #[test]
  fn near_feature_groups_per_source() {
    let anchor = xy(25, 25).expect("valid");
    let sources = [xy(10, 10).expect("valid"), xy(40, 40).expect("valid")];
    let spots = FeatureSpots { storage: None, controller: None, sources: &sources };
    let groups = Shape::NearFeature { feature: Feature::Sources, min: 2, max: 2 }
      .candidates(anchor, &spots);
    assert_eq!(groups.len(), 2);
    assert!(groups[0].iter().all(|t| range(*t, sources[0]) == 2));
  }

  #[test]
  fn lab_block_does_not_touch_its_road() {
    let labs: HashSet<(i8, i8)> = LAB_BLOCK.iter().copied().collect();
    assert_eq!(labs.len(), 10);
    assert!(LAB_ROADS.iter().all(|road| !labs.contains(road)));
  }
}
