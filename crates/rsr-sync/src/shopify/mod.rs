//! Shopify Admin GraphQL integration
//!
//! - [`graphql`]: request transport and error mapping
//! - [`bulk`]: staged uploads, bulk query/mutation submission, polling, downloads
//! - [`types`]: wire types
//! - [`queries`]: GraphQL documents

pub mod bulk;
pub mod graphql;
pub mod queries;
pub mod types;

pub use bulk::{BulkOperationClient, BulkRunOutcome, BulkStatusSource, PollOptions};
pub use graphql::GraphqlClient;
pub use types::{BulkOperationHandle, BulkOperationStatus, ResultLocation, StagedUpload};
