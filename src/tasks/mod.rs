//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache.
//!
//! # Tasks
//! - TTL Sweeper: Removes expired entries on a fixed tick and at the soonest deadline

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;
