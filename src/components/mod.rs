pub mod campus_map;
