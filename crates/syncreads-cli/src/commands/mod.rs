pub mod common;
pub mod device;
pub mod sync;
pub mod syncs;
pub mod user;
