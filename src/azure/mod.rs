//! Azure Resource Manager implementations of the collaborator traits.

pub mod client;
pub mod lister;
pub mod models;
pub mod monitor;
pub mod resource_id;

pub use client::{AzureClient, DEFAULT_API_BASE};
pub use lister::AppServicePlanLister;
pub use monitor::MonitorMetricsFetcher;
pub use resource_id::ResourceId;
