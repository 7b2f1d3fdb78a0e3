use std::sync::Arc;
use tracing::{debug, Instrument, Span};

use super::{MultiTenancyStrategy, RequestContext, StrategyRegistry, Tenant};
use crate::config::Precedence;
use crate::error::Result;

/// A tenant together with the strategy that identified it.
pub struct Tenancy {
    pub tenant: Tenant,
    pub strategy: Arc<dyn MultiTenancyStrategy>,
}

/// Identifies the tenant of a request and binds it into the request context.
pub struct MultiTenancyAction {
    registry: Arc<StrategyRegistry>,
    strategy_names: Vec<String>,
    precedence: Precedence,
    span: Span,
}

impl MultiTenancyAction {
    /// `strategy_names` defaults to `["header"]` when not configured.
    pub fn new(registry: Arc<StrategyRegistry>, strategy_names: Option<Vec<String>>) -> Self {
        Self {
            registry,
            strategy_names: strategy_names.unwrap_or_else(|| vec!["header".to_string()]),
            precedence: Precedence::default(),
            span: tracing::debug_span!("multi_tenancy"),
        }
    }

    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Span under which all resolution events are logged.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn strategy_names(&self) -> &[String] {
        &self.strategy_names
    }

    /// Registered strategies that are enabled by name, in the order they are tried.
    ///
    /// Under [`Precedence::LastConfiguredFirst`] a strategy named later in the
    /// configured list is tried before one named earlier.
    pub fn ordered_strategies(&self) -> Vec<Arc<dyn MultiTenancyStrategy>> {
        let mut enabled: Vec<(usize, Arc<dyn MultiTenancyStrategy>)> = self
            .registry
            .strategies()
            .iter()
            .filter_map(|s| {
                self.strategy_names
                    .iter()
                    .position(|name| name == s.name())
                    .map(|idx| (idx, Arc::clone(s)))
            })
            .collect();

        match self.precedence {
            Precedence::LastConfiguredFirst => enabled.sort_by(|(a, _), (b, _)| b.cmp(a)),
            Precedence::FirstConfiguredFirst => enabled.sort_by_key(|(idx, _)| *idx),
        }

        enabled.into_iter().map(|(_, s)| s).collect()
    }

    /// Tries each enabled strategy in turn until one identifies a tenant.
    pub async fn identify_tenancy(&self, ctx: &RequestContext) -> Result<Option<Tenancy>> {
        self.try_strategies(ctx)
            .instrument(self.span.clone())
            .await
    }

    async fn try_strategies(&self, ctx: &RequestContext) -> Result<Option<Tenancy>> {
        debug!(names = ?self.strategy_names, "Tenancy strategy names configured");
        let strategies = self.ordered_strategies();
        debug!(
            strategies = ?strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Tenancy strategies"
        );

        for strategy in strategies {
            debug!(strategy = strategy.name(), "Trying tenancy strategy");
            if let Some(tenant) = strategy.identify_tenant(ctx).await? {
                debug!(strategy = strategy.name(), tenant = %tenant, "Tenant is now identified");
                return Ok(Some(Tenancy { tenant, strategy }));
            }
        }

        debug!("No tenant is identified");
        Ok(None)
    }

    /// Resolves the tenant for one request.
    ///
    /// On success the tenant is bound into `ctx` and the winning strategy binds
    /// its resources. Strategy errors are returned as-is.
    pub async fn action(&self, ctx: &mut RequestContext) -> Result<Option<Tenant>> {
        debug!(parent: &self.span, path = ctx.base_path(), "Identifying tenant for request");

        let Some(tenancy) = self.identify_tenancy(ctx).await? else {
            return Ok(None);
        };

        debug!(
            parent: &self.span,
            strategy = tenancy.strategy.name(),
            tenant = %tenancy.tenant,
            "Binding resources for tenant"
        );
        ctx.bind_current_tenant(tenancy.tenant.clone());
        tenancy
            .strategy
            .bind_resources(ctx, &tenancy.tenant)
            .instrument(self.span.clone())
            .await?;

        Ok(Some(tenancy.tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenancyError;
    use async_trait::async_trait;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy that always answers the same way and counts its calls.
    struct Recording {
        name: &'static str,
        tenant: Option<&'static str>,
        fail_identify: bool,
        fail_bind: bool,
        identify_calls: AtomicUsize,
        bind_calls: AtomicUsize,
    }

    impl Recording {
        fn build(
            name: &'static str,
            tenant: Option<&'static str>,
            fail_identify: bool,
            fail_bind: bool,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                tenant,
                fail_identify,
                fail_bind,
                identify_calls: AtomicUsize::new(0),
                bind_calls: AtomicUsize::new(0),
            })
        }

        fn new(name: &'static str, tenant: Option<&'static str>) -> Arc<Self> {
            Self::build(name, tenant, false, false)
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Self::build(name, None, true, false)
        }

        /// Identifies `tenant` but fails to bind its resources.
        fn failing_bind(name: &'static str, tenant: &'static str) -> Arc<Self> {
            Self::build(name, Some(tenant), false, true)
        }

        fn identified(&self) -> usize {
            self.identify_calls.load(Ordering::SeqCst)
        }

        fn bound(&self) -> usize {
            self.bind_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MultiTenancyStrategy for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn identify_tenant(&self, _ctx: &RequestContext) -> Result<Option<Tenant>> {
            self.identify_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_identify {
                return Err(TenancyError::strategy(self.name, "boom"));
            }
            Ok(self.tenant.map(Tenant::new))
        }

        async fn bind_resources(&self, ctx: &mut RequestContext, tenant: &Tenant) -> Result<()> {
            self.bind_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_bind {
                return Err(TenancyError::DataSourceNotFound(format!(
                    "datasources.db.{}",
                    tenant.id
                )));
            }
            ctx.bind_alias("datasources.db", format!("datasources.db.{}", tenant.id));
            Ok(())
        }
    }

    fn registry(strategies: &[Arc<Recording>]) -> Arc<StrategyRegistry> {
        let mut registry = StrategyRegistry::new();
        for s in strategies {
            registry.register(s.clone());
        }
        Arc::new(registry)
    }

    fn names(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|s| s.to_string()).collect())
    }

    fn empty_ctx() -> RequestContext {
        RequestContext::from_request(&Request::builder().uri("/users").body(()).unwrap())
    }

    #[tokio::test]
    async fn test_header_strategy_is_the_default() {
        let action = MultiTenancyAction::new(Arc::new(StrategyRegistry::with_defaults()), None);
        assert_eq!(action.strategy_names(), ["header"]);

        let req = Request::builder()
            .uri("/users")
            .header("x-tenant-id", "abc")
            .header("host", "xyz.example.com")
            .body(())
            .unwrap();
        let mut ctx = RequestContext::from_request(&req);
        let tenant = action.action(&mut ctx).await.unwrap();

        assert_eq!(tenant, Some(Tenant::new("abc")));
        assert_eq!(ctx.current_tenant(), Some(&Tenant::new("abc")));
        assert_eq!(ctx.alias("datasources.db"), Some("datasources.db.abc"));
    }

    #[tokio::test]
    async fn test_no_signal_binds_nothing() {
        let a = Recording::new("a", None);
        let b = Recording::new("b", None);
        let action = MultiTenancyAction::new(registry(&[a.clone(), b.clone()]), names(&["a", "b"]));

        let mut ctx = empty_ctx();
        assert_eq!(action.action(&mut ctx).await.unwrap(), None);
        assert!(ctx.current_tenant().is_none());
        assert!(ctx.alias("datasources.db").is_none());
        assert_eq!((a.identified(), b.identified()), (1, 1));
        assert_eq!((a.bound(), b.bound()), (0, 0));
    }

    #[tokio::test]
    async fn test_later_configured_strategy_wins_by_default() {
        let a = Recording::new("a", Some("from-a"));
        let b = Recording::new("b", Some("from-b"));
        let action = MultiTenancyAction::new(registry(&[a.clone(), b.clone()]), names(&["a", "b"]));

        let mut ctx = empty_ctx();
        let tenant = action.action(&mut ctx).await.unwrap();

        assert_eq!(tenant, Some(Tenant::new("from-b")));
        assert_eq!(b.identified(), 1);
        assert_eq!(a.identified(), 0);
        assert_eq!(b.bound(), 1);
        assert_eq!(a.bound(), 0);
    }

    #[tokio::test]
    async fn test_first_configured_first_precedence() {
        let a = Recording::new("a", Some("from-a"));
        let b = Recording::new("b", Some("from-b"));
        let action = MultiTenancyAction::new(registry(&[b.clone(), a.clone()]), names(&["a", "b"]))
            .with_precedence(Precedence::FirstConfiguredFirst);

        let mut ctx = empty_ctx();
        let tenant = action.action(&mut ctx).await.unwrap();

        assert_eq!(tenant, Some(Tenant::new("from-a")));
        assert_eq!((a.identified(), b.identified()), (1, 0));
        assert_eq!((a.bound(), b.bound()), (1, 0));
    }

    #[tokio::test]
    async fn test_order_ignores_registration_order() {
        let a = Recording::new("a", None);
        let b = Recording::new("b", None);
        let c = Recording::new("c", None);
        let action = MultiTenancyAction::new(
            registry(&[b.clone(), c.clone(), a.clone()]),
            names(&["c", "a", "b"]),
        );
        let order: Vec<String> = action
            .ordered_strategies()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_unlisted_strategy_is_never_invoked() {
        let listed = Recording::new("listed", None);
        let unlisted = Recording::new("unlisted", Some("sneaky"));
        let action = MultiTenancyAction::new(
            registry(&[listed.clone(), unlisted.clone()]),
            names(&["listed", "missing"]),
        );

        let mut ctx = empty_ctx();
        assert_eq!(action.action(&mut ctx).await.unwrap(), None);
        assert_eq!(listed.identified(), 1);
        assert_eq!(unlisted.identified(), 0);
        assert_eq!(unlisted.bound(), 0);
    }

    #[tokio::test]
    async fn test_first_match_stops_the_search() {
        let a = Recording::new("a", Some("from-a"));
        let b = Recording::new("b", None);
        let action = MultiTenancyAction::new(registry(&[a.clone(), b.clone()]), names(&["a", "b"]));

        let mut ctx = empty_ctx();
        let tenancy = action.identify_tenancy(&ctx).await.unwrap().unwrap();
        assert_eq!(tenancy.strategy.name(), "a");
        assert_eq!(tenancy.tenant, Tenant::new("from-a"));
        assert_eq!((b.identified(), a.identified()), (1, 1));
        // identify_tenancy alone does not bind
        assert_eq!(a.bound(), 0);

        action.action(&mut ctx).await.unwrap();
        assert_eq!(a.bound(), 1);
    }

    #[tokio::test]
    async fn test_strategy_error_propagates() {
        let broken = Recording::failing("broken");
        let fallback = Recording::new("fallback", Some("abc"));
        let action = MultiTenancyAction::new(
            registry(&[broken.clone(), fallback.clone()]),
            names(&["fallback", "broken"]),
        );

        let mut ctx = empty_ctx();
        let err = action.action(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Strategy { ref strategy, ref message }
                if strategy == "broken" && message == "boom"
        ));
        assert_eq!(fallback.identified(), 0);
        assert!(ctx.current_tenant().is_none());
    }

    #[tokio::test]
    async fn test_bind_error_propagates() {
        let binder = Recording::failing_bind("binder", "abc");
        let fallback = Recording::new("fallback", Some("xyz"));
        let action = MultiTenancyAction::new(
            registry(&[binder.clone(), fallback.clone()]),
            names(&["fallback", "binder"]),
        );

        let mut ctx = empty_ctx();
        let err = action.action(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            TenancyError::DataSourceNotFound(ref k) if k == "datasources.db.abc"
        ));
        assert_eq!((binder.identified(), binder.bound()), (1, 1));
        assert_eq!((fallback.identified(), fallback.bound()), (0, 0));
        // The tenant is bound before its resources
        assert_eq!(ctx.current_tenant(), Some(&Tenant::new("abc")));
        assert!(ctx.alias("datasources.db").is_none());
    }
}
