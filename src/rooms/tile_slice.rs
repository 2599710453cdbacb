use std::ops::{Index, IndexMut};

pub use enum_iterator::all;
use itertools::chain;
use screeps::{RoomXY, Direction};

/// We re-export this because it's useful.
pub use screeps::constants::ROOM_SIZE;

/// The number of tiles in a room and the size of a tile array.
pub const ROOM_AREA: usize = ROOM_SIZE as usize * ROOM_SIZE as usize;

pub type TileSlice<T> = [T; ROOM_AREA];

/// Converts a [`RoomXY`] coordinate pair to a linear index appropriate for use
/// with a static [`TileSlice`].
pub use screeps::local::linear_index_to_xy;

/// Converts a linear index from the internal representation of a static array
/// [`ROOM_AREA`] to [`RoomXY`].
pub use screeps::local::xy_to_linear_index;

/// A boxed value for every tile in a room.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMap<T>(Box<TileSlice<T>>);

impl<T: Copy> TileMap<T> {
  pub fn new_box(init: T) -> TileMap<T> {
    TileMap(Box::new([init; ROOM_AREA]))
  }

  pub fn from_fn(mut f: impl FnMut(RoomXY) -> T) -> TileMap<T> {
    let first = f(linear_index_to_xy(0));
    let mut map = TileMap::new_box(first);
    for idx in 1..ROOM_AREA {
      map.0[idx] = f(linear_index_to_xy(idx));
    }
    map
  }

  #[inline]
  pub fn get(&self, xy: RoomXY) -> T {
    *xy_access(xy, &self.0)
  }

  #[inline]
  pub fn set(&mut self, xy: RoomXY, value: T) {
    *xy_access_mut(xy, &mut self.0) = value;
  }
}

impl<T> Index<RoomXY> for TileMap<T> {
  type Output = T;
  fn index(&self, xy: RoomXY) -> &T {
    xy_access(xy, &self.0)
  }
}

impl<T> IndexMut<RoomXY> for TileMap<T> {
  fn index_mut(&mut self, xy: RoomXY) -> &mut T {
    xy_access_mut(xy, &mut self.0)
  }
}

/// Build a coordinate from raw bytes, or `None` if it's out of the room.
#[inline]
pub fn xy(x: u8, y: u8) -> Option<RoomXY> {
  RoomXY::try_from((x, y)).ok()
}

/// Stable ordering key for coordinates.
#[inline]
pub fn xy_key(xy: RoomXY) -> u16 {
  xy_to_linear_index(xy) as u16
}

#[inline]
pub fn offset(xy: RoomXY, (dx, dy): (i8, i8)) -> Option<RoomXY> {
  xy.checked_add((dx, dy))
}

/// Chebyshev distance, which is how far a creep has to walk on open ground.
#[inline]
pub fn range(a: RoomXY, b: RoomXY) -> u8 {
  let (ax, ay): (u8, u8) = a.into();
  let (bx, by): (u8, u8) = b.into();
  ax.abs_diff(bx).max(ay.abs_diff(by))
}

/// How many tiles it is to the nearest room edge.
#[inline]
pub fn edge_distance(xy: RoomXY) -> u8 {
  let (x, y): (u8, u8) = xy.into();
  let far = ROOM_SIZE - 1;
  x.min(y).min(far - x).min(far - y)
}

#[inline]
pub fn surrounding_xy(xy: RoomXY) -> impl Iterator<Item = RoomXY> {
  all::<Direction>()
    .filter_map(move |dir| xy.checked_add_direction(dir))
}

#[inline]
pub fn surrounding_xy_with_dir(xy: RoomXY) -> impl Iterator<Item = (Direction, RoomXY)> {
  all::<Direction>()
    .filter_map(move |dir| xy.checked_add_direction(dir).map(|xy| (dir, xy)))
}

/// Offsets of the tiles at exactly `radius` chessboard distance, walked
/// clockwise from the top left corner.
pub fn ring_offsets(radius: u8) -> Vec<(i8, i8)> {
  let r = radius as i8;
  if r == 0 {
    return vec![(0, 0)];
  }
  chain!(
    // top, left to right
    (-r..r).map(|dx| (dx, -r)),
    // right, going down
    (-r..r).map(|dy| (r, dy)),
    // bottom, right to left
    (-r..r).map(|dx| (-dx, r)),
    // left, going up
    (-r..r).map(|dy| (-r, -dy)),
  ).collect()
}

/// Every tile at exactly `radius` chessboard distance, in the order of
/// [`ring_offsets`]. Tiles outside the room are skipped.
pub fn ring_around(center: RoomXY, radius: u8) -> impl Iterator<Item = RoomXY> {
  ring_offsets(radius).into_iter()
    .filter_map(move |delta| offset(center, delta))
}

/// Every tile with `min <= range <= max` around the center, ring by ring.
pub fn band_around(center: RoomXY, min: u8, max: u8) -> impl Iterator<Item = RoomXY> {
  (min..=max).flat_map(move |radius| ring_around(center, radius))
}

/// Which way a single step from `from` to `to` goes.
pub fn direction_between(from: RoomXY, to: RoomXY) -> Option<Direction> {
  surrounding_xy_with_dir(from)
    .find(|(_, xy)| *xy == to)
    .map(|(dir, _)| dir)
}

/// Borrow a value inside a [`TileSlice`] at the given coordinates.
#[inline]
pub fn xy_access<T>(xy: RoomXY, slice: &TileSlice<T>) -> &T {
  &slice[xy_to_linear_index(xy)]
}

/// Mutably borrow a value inside a [`TileSlice`] at the given coordinates.
#[inline]
pub fn xy_access_mut<T>(xy: RoomXY, slice: &mut TileSlice<T>) -> &mut T {
  &mut slice[xy_to_linear_index(xy)]
}
