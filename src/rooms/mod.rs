pub mod tile_slice;
pub mod path_search;
