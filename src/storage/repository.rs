//! Per-room key-value storage for everything the planner keeps between ticks.
//!
//! Components never touch memory directly: they get a [`Repository`] and
//! read and write plain records through it. On the host it's backed by a
//! raw memory segment; in tests it's just a map.

use std::collections::BTreeMap;
use std::fmt;

use minicbor::bytes::ByteVec;
use minicbor::{Encode, Decode};
use screeps::RoomName;

use super::serialization::{from_buffer, to_bytes, StoreError};

/// Which record for a room.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
  Anchor,
  Layout,
  Traffic,
  PathCache,
  /// Set by the operator to force a fresh layout.
  ReplanRequested,
}

impl RecordKind {
  fn key(self) -> &'static str {
    match self {
      RecordKind::Anchor => "anchor",
      RecordKind::Layout => "layout",
      RecordKind::Traffic => "traffic",
      RecordKind::PathCache => "paths",
      RecordKind::ReplanRequested => "replan",
    }
  }
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.key())
  }
}

pub trait Repository {
  fn get(&self, room: RoomName, kind: RecordKind) -> Option<Vec<u8>>;
  fn set(&mut self, room: RoomName, kind: RecordKind, value: Vec<u8>);
  fn delete(&mut self, room: RoomName, kind: RecordKind);

  fn contains(&self, room: RoomName, kind: RecordKind) -> bool {
    self.get(room, kind).is_some()
  }
}

/// Decode a record if there is one.
pub fn load<T>(repo: &impl Repository, room: RoomName, kind: RecordKind) -> Result<Option<T>, StoreError>
where T: for<'b> Decode<'b, ()> {
  match repo.get(room, kind) {
    Some(bytes) => Ok(Some(from_buffer(&bytes)?)),
    None => Ok(None),
  }
}

pub fn save<T: Encode<()>>(
  repo: &mut impl Repository,
  room: RoomName,
  kind: RecordKind,
  value: &T
) -> Result<(), StoreError> {
  let bytes = to_bytes(value)?;
  repo.set(room, kind, bytes);
  Ok(())
}

/// A repository that lives in a map. It's also what gets written to the
/// raw memory segment as a whole.
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct MemoryRepository {
  #[n(0)] records: BTreeMap<String, ByteVec>,
}

impl MemoryRepository {
  pub fn new() -> MemoryRepository {
    Default::default()
  }

  fn key(room: RoomName, kind: RecordKind) -> String {
    format!("{room}/{kind}")
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

impl Repository for MemoryRepository {
  fn get(&self, room: RoomName, kind: RecordKind) -> Option<Vec<u8>> {
    self.records.get(&Self::key(room, kind))
      .map(|bytes| bytes.to_vec())
  }

  fn set(&mut self, room: RoomName, kind: RecordKind, value: Vec<u8>) {
    self.records.insert(Self::key(room, kind), ByteVec::from(value));
  }

  fn delete(&mut self, room: RoomName, kind: RecordKind) {
    self.records.remove(&Self::key(room, kind));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::serialization::{to_buffer, to_mem_string, from_mem_string};

  fn room(name: &str) -> RoomName {
    RoomName::new(name).expect("room name")
  }

  #[test]
  fn records_are_kept_per_room_and_kind() {
    let mut repo = MemoryRepository::new();
    save(&mut repo, room("W1N1"), RecordKind::Anchor, &7u32).expect("save");
    save(&mut repo, room("W2N1"), RecordKind::Anchor, &9u32).expect("save");
    assert_eq!(load::<u32>(&repo, room("W1N1"), RecordKind::Anchor).expect("load"), Some(7));
    assert_eq!(load::<u32>(&repo, room("W2N1"), RecordKind::Anchor).expect("load"), Some(9));
    assert_eq!(load::<u32>(&repo, room("W1N1"), RecordKind::Layout).expect("load"), None);
    repo.delete(room("W1N1"), RecordKind::Anchor);
    assert!(!repo.contains(room("W1N1"), RecordKind::Anchor));
    assert_eq!(repo.len(), 1);
  }

  #[test]
  fn whole_repository_fits_in_a_segment_string() {
    let mut repo = MemoryRepository::new();
    repo.set(room("E5S5"), RecordKind::ReplanRequested, vec![1]);
    let mut buffer = Vec::new();
    to_buffer(&repo, &mut buffer).expect("encode");
    let segment = to_mem_string(&buffer);
    buffer.clear();
    from_mem_string(&segment, &mut buffer).expect("base64");
    let back: MemoryRepository = from_buffer(&buffer).expect("decode");
    assert_eq!(back, repo);
  }

  #[test]
  fn wrong_shape_is_a_decode_error() {
    let mut repo = MemoryRepository::new();
    repo.set(room("W1N1"), RecordKind::Layout, vec![0x61, 0x62]);
    assert!(load::<u32>(&repo, room("W1N1"), RecordKind::Layout).is_err());
  }
}
