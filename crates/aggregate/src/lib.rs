//! sfa-aggregate: the AM API v3 over legacy SFA testbed drivers.
//!
//! [`SliverLifecycle`] maps allocate / provision / renew / delete onto a
//! [`LegacyDriver`] and records allocation state in an
//! [`AllocationStore`](sfa_storage::AllocationStore). [`AggregateManager`]
//! wraps it with credential checks, RSpec version negotiation, policy
//! chains and advertisement caching.

pub mod auth;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod options;
pub mod policy;

pub use auth::{AuthError, Authorizer, StaticAuthorizer, TrustAll, ValidCredentials, Verb};
pub use cache::{ResourceCache, TtlCache};
pub use config::{AggregateConfig, InterfaceKind};
pub use driver::{driver_for, DriverError, FakeTestbed, LegacyDriver, SliceStatus};
pub use error::{AmError, ConfigError};
pub use lifecycle::SliverLifecycle;
pub use manager::{AggregateManager, VersionInfo};
pub use options::{
    AllocationStatus, CallOptions, DescribeResult, OperationalStatus, SliceUser, SliverStatus,
    StatusResult,
};
pub use policy::{Blacklist, Chain, PassThrough, PolicyError, PolicyFilter};
