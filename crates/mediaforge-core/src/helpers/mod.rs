// crates/mediaforge-core/src/helpers/mod.rs
//
// Small pure helpers shared by the planner and the front end.

pub mod time;
