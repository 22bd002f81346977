//! Typed clients for the InfluxDB v2 management API.
//!
//! - http: request/response plumbing shared by every call
//! - orgs: organization lookup by name or ID
//! - users: the authenticated user
//! - buckets: bucket CRUD
//! - tasks: task CRUD, including the scheduling block injected on create
//!
//! Checks and notification resources have no typed client; their reconcilers
//! issue raw requests through [`crate::context::ConnectionContext::send`].

pub mod buckets;
pub mod http;
pub mod orgs;
pub mod tasks;
pub mod users;

pub use buckets::{Bucket, BucketUpdate, BucketsApi, NewBucket, RetentionRule};
pub use http::{ApiRequest, ApiResponse};
pub use orgs::{Organization, OrganizationsApi};
pub use tasks::{NewTask, Task, TaskUpdate, TasksApi};
pub use users::{User, UsersApi};
