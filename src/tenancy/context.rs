use axum::http::{HeaderMap, Method, Request, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The tenant a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Request extension holding the resolved tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTenant(pub Tenant);

/// Request-scoped state seen by tenancy strategies.
///
/// Holds a snapshot of the request line and headers, the tenant once one is
/// bound, and resource aliases set by the winning strategy.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    current_tenant: Option<Tenant>,
    aliases: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            current_tenant: None,
            aliases: HashMap::new(),
        }
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.method().clone(), req.uri().clone(), req.headers().clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn base_path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string. Non UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn current_tenant(&self) -> Option<&Tenant> {
        self.current_tenant.as_ref()
    }

    pub fn bind_current_tenant(&mut self, tenant: Tenant) {
        self.current_tenant = Some(tenant);
    }

    pub fn bind_alias(&mut self, key: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(key.into(), target.into());
    }

    pub fn alias(&self, key: &str) -> Option<&str> {
        self.aliases.get(key).map(String::as_str)
    }

    /// Follows an alias for `key`, falling back to the key itself.
    pub fn resolve_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.alias(key).unwrap_or(key)
    }
}
