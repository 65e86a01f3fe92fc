//! SQL per entity. Every function runs through a `TrackedConn` so writes
//! feed the change bus.

pub mod customers;
pub mod items;
pub mod lookups;
pub mod projects;
pub mod task_data;
pub mod tasks;
pub mod time_tracking;
pub mod users;
