use enum_iterator::Sequence;
use minicbor::{Encode, Decode};
use screeps::StructureType;

/// The highest controller level.
pub const MAX_LEVEL: u8 = 8;

macro_rules! gen_categories {
  ($($n:literal => $t:ident cost $cost:literal caps [$($cap:literal),*])*) => {
    /// Every kind of structure the planner knows how to lay out and build.
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Copy, Clone, Encode, Decode, Sequence)]
    #[cbor(index_only)]
    #[repr(u8)]
    pub enum Category {
      $(
        #[n($n)] $t = $n
      ),*
    }

    impl Category {
      pub fn structure_type(self) -> StructureType {
        match self {
          $(
            Category::$t => StructureType::$t
          ),*
        }
      }

      /// Anything we don't plan (controllers, portals, keeper lairs) has no
      /// category.
      pub fn from_structure_type(ty: StructureType) -> Option<Category> {
        match ty {
          $(
            StructureType::$t => Some(Category::$t),
          )*
          _ => None,
        }
      }

      /// How much energy it takes to finish a construction site.
      pub fn build_cost(self) -> u32 {
        match self {
          $(
            Category::$t => $cost
          ),*
        }
      }

      /// How many of these a room may have at the given controller level.
      pub fn cap(self, level: u8) -> u32 {
        let table: [u32; MAX_LEVEL as usize + 1] = match self {
          $(
            Category::$t => [$($cap),*]
          ),*
        };
        table[level.min(MAX_LEVEL) as usize]
      }
    }
  }
}

gen_categories! {
  0 => Spawn cost 15000 caps [0, 1, 1, 1, 1, 1, 1, 2, 3]
  1 => Extension cost 3000 caps [0, 0, 5, 10, 20, 30, 40, 50, 60]
  2 => Road cost 300 caps [2500, 2500, 2500, 2500, 2500, 2500, 2500, 2500, 2500]
  3 => Wall cost 1 caps [0, 0, 2500, 2500, 2500, 2500, 2500, 2500, 2500]
  4 => Rampart cost 1 caps [0, 0, 2500, 2500, 2500, 2500, 2500, 2500, 2500]
  5 => Link cost 5000 caps [0, 0, 0, 0, 0, 2, 3, 4, 6]
  6 => Storage cost 30000 caps [0, 0, 0, 0, 1, 1, 1, 1, 1]
  7 => Tower cost 5000 caps [0, 0, 0, 1, 1, 2, 2, 3, 6]
  8 => Observer cost 8000 caps [0, 0, 0, 0, 0, 0, 0, 0, 1]
  9 => PowerSpawn cost 100000 caps [0, 0, 0, 0, 0, 0, 0, 0, 1]
  10 => Extractor cost 5000 caps [0, 0, 0, 0, 0, 0, 1, 1, 1]
  11 => Lab cost 50000 caps [0, 0, 0, 0, 0, 0, 3, 6, 10]
  12 => Terminal cost 100000 caps [0, 0, 0, 0, 0, 0, 1, 1, 1]
  13 => Container cost 5000 caps [5, 5, 5, 5, 5, 5, 5, 5, 5]
  14 => Nuker cost 100000 caps [0, 0, 0, 0, 0, 0, 0, 0, 1]
  15 => Factory cost 100000 caps [0, 0, 0, 0, 0, 0, 0, 1, 1]
}

impl Category {
  /// The first controller level this category can be built at.
  pub fn unlock_level(self) -> Option<u8> {
    (0..=MAX_LEVEL).find(|level| self.cap(*level) > 0)
  }

  pub fn is_defensive(self) -> bool {
    matches!(self, Category::Tower | Category::Rampart | Category::Wall)
  }

  pub fn is_economic(self) -> bool {
    use Category::*;
    matches!(self, Spawn | Extension | Container | Link | Storage)
  }

  /// Categories a creep can stand on.
  pub fn walkable(self) -> bool {
    matches!(self, Category::Road | Category::Container | Category::Rampart)
  }

  /// Whether a structure of this category can go on a tile that already
  /// holds `occupant`.
  ///
  /// NOTE: towers sharing a tile with a road assumes the host replaces the
  /// road. If it refuses, the executor clears the road instead.
  pub fn can_share_with(self, occupant: Category) -> bool {
    use Category::*;
    match (self, occupant) {
      (Rampart, Rampart) => false,
      (Rampart, _) => true,
      (_, Rampart) => true,
      (Road, Container) => true,
      (Container, Road) | (Tower, Road) => true,
      _ => false,
    }
  }
}
