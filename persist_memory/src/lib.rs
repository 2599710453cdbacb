use minicbor::{Encode, Decode};
use screeps::{Position, RoomCoordinate, RoomName, RoomXY};
use thiserror::Error;

/// Failure to bring a stored value back into a live one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviveError {
  #[error("stored coordinate ({x}, {y}) is outside of the room")]
  OutOfBounds { x: u8, y: u8 },
  #[error("stored record is malformed: {0}")]
  Malformed(&'static str),
}

/// A trait for types that are only plain data once they hit memory.
///
/// Memory can't hold live handles, so anything richer than numbers has
/// to be flattened with `to_persist` and rebuilt with `revive` when it is
/// read back.
pub trait Persist: Sized {
  /// The type that will be fully persisted, serialized to RawMemory.
  type Persisted;

  /// Whatever the stored form needs to be bound to again, like the room
  /// a coordinate belongs to.
  type Context: Copy;

  /// Generate the type that will be persisted this tick.
  fn to_persist(&self) -> Self::Persisted;

  /// Revive the important information from the persisted memory.
  fn revive(stored: Self::Persisted, ctx: Self::Context) -> Result<Self, ReviveError>;
}

/// A room coordinate as two plain bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct PackedXY {
  #[n(0)] pub x: u8,
  #[n(1)] pub y: u8,
}

impl PackedXY {
  pub fn new(x: u8, y: u8) -> PackedXY {
    PackedXY { x, y }
  }
}

impl Persist for RoomXY {
  type Persisted = PackedXY;
  type Context = ();

  fn to_persist(&self) -> PackedXY {
    let (x, y): (u8, u8) = (*self).into();
    PackedXY { x, y }
  }

  fn revive(stored: PackedXY, _: ()) -> Result<RoomXY, ReviveError> {
    let PackedXY { x, y } = stored;
    match (RoomCoordinate::new(x), RoomCoordinate::new(y)) {
      (Ok(x), Ok(y)) => Ok(RoomXY { x, y }),
      _ => Err(ReviveError::OutOfBounds { x, y }),
    }
  }
}

/// Positions are stored without their room; the room is supplied when
/// they're revived.
impl Persist for Position {
  type Persisted = PackedXY;
  type Context = RoomName;

  fn to_persist(&self) -> PackedXY {
    self.xy().to_persist()
  }

  fn revive(stored: PackedXY, room: RoomName) -> Result<Position, ReviveError> {
    let xy = RoomXY::revive(stored, ())?;
    Ok(Position::new(xy.x, xy.y, room))
  }
}

impl<T: Persist> Persist for Vec<T> {
  type Persisted = Vec<T::Persisted>;
  type Context = T::Context;

  fn to_persist(&self) -> Self::Persisted {
    self.iter().map(Persist::to_persist).collect()
  }

  fn revive(stored: Self::Persisted, ctx: T::Context) -> Result<Self, ReviveError> {
    stored.into_iter()
      .map(|item| T::revive(item, ctx))
      .collect()
  }
}

macro_rules! base_impl {
  ($($t:ident),*) => {
    $(
      impl Persist for $t {
        type Persisted = $t;
        type Context = ();
        fn to_persist(&self) -> $t {
          self.clone()
        }
        fn revive(stored: $t, _: ()) -> Result<$t, ReviveError> {
          Ok(stored)
        }
      }
    )*
  }
}

base_impl!(u8, u16, u32, bool);
