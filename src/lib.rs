//! ckptguard - crash-consistency engine for periodic checkpoint
//! artifacts.
//!
//! Writers persist checkpoints under explicit durability contracts
//! (atomic or deliberately unsafe), with seeded fault injection and
//! simulated crashes at precise protocol points. Scanners verify the
//! artifacts after the fact and the rollback selector points an alias at
//! the newest checkpoint that survived.

pub mod cli;
pub mod crash;
pub mod fault;
pub mod group;
pub mod hash;
pub mod observability;
pub mod payload;
pub mod persist;
pub mod rollback;
pub mod scan;
pub mod writer;
