//! Domain logic shared by the REST handlers and the desktop facade.

pub mod activity;
