use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use super::client::AzureClient;
use super::models::{AppServicePlan, Page, Site};
use super::resource_id::ResourceId;
use crate::error::{Error, Result};
use crate::source::{ResourceLister, ResourceRef};

/// API version for `Microsoft.Web` calls.
pub const WEB_API_VERSION: &str = "2022-03-01";

/// Lists the web apps hosted on an App Service Plan.
///
/// Grouping keys may be a plan name (resolved in the default resource group),
/// `<resourceGroup>/<planName>`, or a full plan resource ID.
pub struct AppServicePlanLister {
    client: AzureClient,
    default_resource_group: Option<String>,
}

impl AppServicePlanLister {
    pub fn new(client: AzureClient, default_resource_group: Option<String>) -> Self {
        Self {
            client,
            default_resource_group,
        }
    }

    /// ARM path of the plan a grouping key refers to.
    pub fn plan_path(&self, grouping_key: &str) -> Result<String> {
        let key = grouping_key.trim();

        if key.starts_with('/') {
            let id: ResourceId = key.parse()?;
            if !id.is_type("Microsoft.Web", "serverfarms") {
                return Err(Error::InvalidResourceId(format!(
                    "not an App Service Plan: {key}"
                )));
            }
            return Ok(id.to_string());
        }

        let (resource_group, plan) = match key.split_once('/') {
            Some((rg, plan)) if !rg.is_empty() && !plan.is_empty() && !plan.contains('/') => {
                (rg.to_string(), plan)
            }
            Some(_) => {
                return Err(Error::InvalidResourceId(format!(
                    "expected <resourceGroup>/<planName>: {key}"
                )))
            }
            None => {
                let rg = self.default_resource_group.clone().ok_or_else(|| {
                    Error::Config(format!(
                        "no resource group for plan '{key}'. Pass --resource-group or run: appidle config set resource_group <NAME>"
                    ))
                })?;
                (rg, key)
            }
        };
        if plan.is_empty() {
            return Err(Error::InvalidResourceId("empty plan name".into()));
        }

        Ok(format!(
            "/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.Web/serverfarms/{plan}",
            self.client.subscription_id()
        ))
    }
}

#[async_trait]
impl ResourceLister for AppServicePlanLister {
    async fn list(&self, grouping_key: &str) -> Result<Vec<ResourceRef>> {
        let plan_path = self.plan_path(grouping_key)?;
        let query = [("api-version", WEB_API_VERSION)];

        let plan: AppServicePlan = self
            .client
            .get_optional(&plan_path, &query)
            .await?
            .ok_or_else(|| Error::GroupingNotFound(grouping_key.to_string()))?;
        log::info!(
            "Found App Service Plan {} ({})",
            plan.name,
            plan.location.as_deref().unwrap_or("unknown location")
        );

        let mut resources = Vec::new();
        let mut next: Option<Url> = Some(self.client.url(&format!("{plan_path}/sites"), &query)?);
        let mut seen = HashSet::new();
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            if !self.client.is_same_origin(&url) {
                return Err(Error::Api(format!(
                    "refusing to follow nextLink to {}",
                    url.origin().ascii_serialization()
                )));
            }
            if !seen.insert(url.clone()) {
                log::warn!("nextLink {} repeats, stopping after {pages} page(s)", url.path());
                break;
            }

            let page: Page<Site> = self
                .client
                .get_url(url)
                .await?
                .ok_or_else(|| Error::GroupingNotFound(grouping_key.to_string()))?;
            pages += 1;

            for site in page.value {
                match (site.id, site.name) {
                    (Some(id), Some(name)) => resources.push(ResourceRef::new(id, name)),
                    (id, name) => log::warn!(
                        "Skipping site without id or name (id: {id:?}, name: {name:?})"
                    ),
                }
            }

            next = match page.next_link.as_deref() {
                Some(link) if !link.is_empty() => Some(Url::parse(link)?),
                _ => None,
            };
        }

        log::debug!("Listed {} sites in {pages} page(s)", resources.len());
        Ok(resources)
    }
}
