//! Player pooling
//!
//! [`ObjectsPool`] is a generic bounded, recycling pool; [`PlayersPool`]
//! keeps one of them per provider.

pub mod objects_pool;
pub mod players_pool;

pub use objects_pool::{ObjectFactory, ObjectsPool, PoolStats};
pub use players_pool::PlayersPool;
