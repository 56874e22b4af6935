//! Background Tasks Module
//!
//! Contains the background task that keeps a disk store under its capacity.
//!
//! # Tasks
//! - Eviction: removes least recently used entries on demand and on a timer

mod eviction;

pub use eviction::EvictionPass;
pub(crate) use eviction::spawn_eviction_task;
