use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed Azure Resource Manager resource ID.
///
/// Only the leaf resource is kept separately; nested types such as
/// `sites/<app>/slots/<slot>` are joined into `resource_type` with the parent
/// names kept in `parents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    pub resource_type: String,
    pub parents: Vec<String>,
    pub name: String,
}

impl ResourceId {
    /// Parse `/subscriptions/<sub>/resourceGroups/<rg>/providers/<ns>/<type>/<name>[/<type>/<name>...]`.
    ///
    /// Segment keywords are matched case-insensitively, as ARM does.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |msg: &str| Error::InvalidResourceId(format!("{msg}: {input}"));

        let trimmed = input.trim().trim_end_matches('/');
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let keyword = |i: usize, expected: &str| {
            segments
                .get(i)
                .is_some_and(|s| s.eq_ignore_ascii_case(expected))
        };
        if !keyword(0, "subscriptions") || !keyword(2, "resourceGroups") || !keyword(4, "providers") {
            return Err(invalid("not a resource ID"));
        }

        let subscription_id = segments.get(1).ok_or_else(|| invalid("missing subscription"))?;
        let resource_group = segments.get(3).ok_or_else(|| invalid("missing resource group"))?;
        let provider = segments.get(5).ok_or_else(|| invalid("missing provider"))?;

        let typed = &segments[6.min(segments.len())..];
        if typed.is_empty() || typed.len() % 2 != 0 {
            return Err(invalid("expected <type>/<name> pairs after the provider"));
        }

        let types: Vec<&str> = typed.iter().step_by(2).copied().collect();
        let mut names: Vec<String> = typed.iter().skip(1).step_by(2).map(|s| s.to_string()).collect();
        let name = names.pop().ok_or_else(|| invalid("missing resource name"))?;

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            provider: provider.to_string(),
            resource_type: types.join("/"),
            parents: names,
            name,
        })
    }

    /// Whether this ID names a resource of `provider/resource_type`.
    pub fn is_type(&self, provider: &str, resource_type: &str) -> bool {
        self.provider.eq_ignore_ascii_case(provider)
            && self.resource_type.eq_ignore_ascii_case(resource_type)
    }

    /// Canonical path form, suitable for appending to the ARM endpoint.
    pub fn to_path(&self) -> String {
        let mut path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, self.resource_group, self.provider
        );
        let mut names = self.parents.iter().chain(std::iter::once(&self.name));
        for ty in self.resource_type.split('/') {
            path.push('/');
            path.push_str(ty);
            if let Some(name) = names.next() {
                path.push('/');
                path.push_str(name);
            }
        }
        path
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_path())
    }
}
