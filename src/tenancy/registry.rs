use std::sync::Arc;

use super::strategies::{HeaderStrategy, HostStrategy, JwtStrategy};
use super::MultiTenancyStrategy;

/// Strategies available to the tenancy action, populated at startup.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn MultiTenancyStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `header`, `host` and `jwt` strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(HeaderStrategy))
            .register(Arc::new(HostStrategy))
            .register(Arc::new(JwtStrategy));
        registry
    }

    /// Registers a strategy, replacing any earlier one with the same name.
    pub fn register(&mut self, strategy: Arc<dyn MultiTenancyStrategy>) -> &mut Self {
        match self
            .strategies
            .iter()
            .position(|s| s.name() == strategy.name())
        {
            Some(idx) => {
                tracing::debug!("Replacing tenancy strategy {}", strategy.name());
                self.strategies[idx] = strategy;
            }
            None => self.strategies.push(strategy),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MultiTenancyStrategy>> {
        self.strategies.iter().find(|s| s.name() == name).cloned()
    }

    /// All registered strategies, in registration order.
    pub fn strategies(&self) -> &[Arc<dyn MultiTenancyStrategy>] {
        &self.strategies
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
