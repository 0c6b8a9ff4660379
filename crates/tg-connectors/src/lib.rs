//! # tg-connectors
//!
//! Microsoft Graph integration for Tenant Guard.
//!
//! This crate provides the connector traits standards consume (`GraphApi`,
//! `LicenseChecker`), the multi-tenant Graph connector that implements them
//! over HTTPS, and an in-memory mock for tests and dry runs.

pub mod graph;
pub mod http;
pub mod mock;
pub mod normalize;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use graph::{
    GraphConfig, GraphConnector, DEFAULT_TOKEN_URL, GRAPH_BETA_URL, GRAPH_DEFAULT_SCOPE,
    SHAREPOINT_SETTINGS_PATH, SUBSCRIBED_SKUS_PATH,
};
pub use http::{HttpClient, RateLimitConfig};
pub use mock::{GraphCall, GraphMethod, MockGraphConnector};
pub use normalize::{error_details, normalize_error};
pub use secure_string::SecureString;
pub use traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    GraphApi, LicenseChecker,
};
