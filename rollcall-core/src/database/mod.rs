//! Store boundary: ports (traits) and their PostgreSQL implementations.

pub mod ports;
pub mod postgres;
pub mod repositories;

pub use ports::memberships::MembershipsRepository;
pub use postgres::{PoolStats, PostgresDatabase};
pub use repositories::memberships::PostgresMembershipsRepository;
