//! Per-tenant datasources.
//!
//! Every configured datasource is registered under `datasources.<name>`. The
//! tenancy strategies alias the shared [`DATASOURCE_KEY`] to the tenant's own
//! datasource, so handlers resolving that key through the request context
//! land on tenant-isolated data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, TenancyError};
use crate::tenancy::{RequestContext, Tenant};

/// Key handlers resolve to reach the datasource of the current request.
pub const DATASOURCE_KEY: &str = "datasources.db";

pub fn tenant_datasource_key(tenant: &Tenant) -> String {
    format!("{}.{}", DATASOURCE_KEY, tenant.id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// In-memory store of users.
#[derive(Debug)]
pub struct DataSource {
    name: String,
    users: RwLock<Vec<User>>,
}

impl DataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create_user(&self, new_user: NewUser) -> User {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: new_user.tenant_id,
            name: new_user.name,
        };
        self.users.write().await.push(user.clone());
        tracing::debug!("Created user {} in {}", user.id, self.name);
        user
    }

    pub async fn find_users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn find_user(&self, id: Uuid) -> Option<User> {
        self.users.read().await.iter().find(|u| u.id == id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    sources: HashMap<String, Arc<DataSource>>,
}

impl DataSourceRegistry {
    /// Builds one datasource per name, e.g. `db` becomes `datasources.db`.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources = names
            .into_iter()
            .map(|name| {
                let key = format!("datasources.{}", name.as_ref());
                (key.clone(), Arc::new(DataSource::new(key)))
            })
            .collect();
        Self { sources }
    }

    pub fn get(&self, key: &str) -> Option<Arc<DataSource>> {
        self.sources.get(key).cloned()
    }

    /// Looks `key` up through the request's aliases.
    pub fn resolve(&self, ctx: &RequestContext, key: &str) -> Result<Arc<DataSource>> {
        let target = ctx.resolve_key(key);
        self.get(target)
            .ok_or_else(|| TenancyError::DataSourceNotFound(target.to_string()))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sources.len()
    }
}
