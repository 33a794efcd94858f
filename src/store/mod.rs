//! Object store adapters.
//!
//! Submodules:
//! - `client`: the `ObjectBackend` trait consumed by the filesystem layer
//! - `s3`: S3-compatible adapter built on aws-sdk-s3
//! - `memory`: in-memory adapter with faithful prefix/delimiter listing,
//!   used for local development and tests
//!
//! Responsibilities summary:
//! - Provide an async API for head/get/put/delete/copy of objects.
//! - Provide paginated prefix listings with optional delimiter grouping.
//! - Keep retries/backoff inside the adapter; callers treat every call as
//!   fail-fast.

pub mod client;
pub mod memory;
pub mod s3;
