//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::{
    BackorderService, InventoryService, JwtKeys, LinkSigner, Links, Mailer, NotificationService,
    OrderStatusService, ReadinessService, RestockService, WaitlistService,
};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Services borrow from it for one request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    jwt: JwtKeys,
    links: Links,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Persistence backend (`PgStore` in production)
    /// * `mailer` - Email transport
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret);
        let links = Links::new(
            config.base_url.clone(),
            LinkSigner::new(config.link_secret.clone()),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                mailer,
                jwt,
                links,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    /// Keys for verifying access tokens.
    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    #[must_use]
    pub fn links(&self) -> &Links {
        &self.inner.links
    }

    #[must_use]
    pub fn restock(&self) -> RestockService<'_> {
        RestockService::new(self.store())
    }

    #[must_use]
    pub fn waitlist(&self) -> WaitlistService<'_> {
        WaitlistService::new(self.store())
    }

    #[must_use]
    pub fn backorders(&self) -> BackorderService<'_> {
        BackorderService::new(
            self.store(),
            self.mailer(),
            self.links(),
            self.config().locale,
        )
    }

    #[must_use]
    pub fn notifications(&self) -> NotificationService<'_> {
        NotificationService::new(
            self.store(),
            self.mailer(),
            self.links(),
            self.config().locale,
        )
    }

    #[must_use]
    pub fn order_status(&self) -> OrderStatusService<'_> {
        OrderStatusService::new(
            self.store(),
            self.mailer(),
            self.links(),
            self.config().locale,
        )
    }

    #[must_use]
    pub fn inventory(&self) -> InventoryService<'_> {
        InventoryService::new(self.store())
    }

    #[must_use]
    pub fn readiness(&self) -> ReadinessService<'_> {
        ReadinessService::new(self.config(), self.store())
    }
}
