//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Repositories;
use crate::services::auth::{AuthService, PasswordHasher, SessionTokens};
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::media::ImageHost;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like repositories, token keys and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    repos: Repositories,
    tokens: SessionTokens,
    hasher: PasswordHasher,
    images: Arc<dyn ImageHost>,
}

impl AppState {
    /// Create a new application state with the production password hasher.
    #[must_use]
    pub fn new(config: ApiConfig, repos: Repositories, images: Arc<dyn ImageHost>) -> Self {
        Self::with_hasher(config, repos, images, PasswordHasher::default())
    }

    /// Create a new application state with an explicit password hasher.
    #[must_use]
    pub fn with_hasher(
        config: ApiConfig,
        repos: Repositories,
        images: Arc<dyn ImageHost>,
        hasher: PasswordHasher,
    ) -> Self {
        let tokens = SessionTokens::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                tokens,
                hasher,
                images,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the repositories.
    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Get a reference to the session token issuer.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    /// Get a reference to the product image host.
    #[must_use]
    pub fn images(&self) -> &dyn ImageHost {
        self.inner.images.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.repos.users.as_ref(), &self.inner.hasher)
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.inner.repos.products.as_ref())
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_> {
        let repos = &self.inner.repos;
        CartService::new(repos.carts.as_ref(), repos.products.as_ref())
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        let repos = &self.inner.repos;
        CheckoutService::new(
            repos.carts.as_ref(),
            repos.products.as_ref(),
            repos.addresses.as_ref(),
            repos.orders.as_ref(),
        )
    }
}

/// In-memory state for router tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use secrecy::SecretString;

    use super::AppState;
    use crate::config::{ApiConfig, AuthConfig, MediaConfig};
    use crate::db::Repositories;
    use crate::db::memory::MemoryStore;
    use crate::services::auth::PasswordHasher;
    use crate::services::media::{ImageHost, StubImageHost};

    /// Configuration that never touches the environment.
    #[must_use]
    pub fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://unused@localhost/unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://localhost:50001".to_string(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("k3Jd8vQz1LmN0pXw7RtY2bHc5FgA9sUe"),
                token_ttl: Duration::from_secs(60 * 60),
                secure_cookie: false,
            },
            client_origin: "http://localhost:5173".to_string(),
            auth_rate_limit: false,
            media: MediaConfig {
                cloud_name: "test".to_string(),
                api_key: "test".to_string(),
                api_secret: SecretString::from("unused"),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// State over a fresh [`MemoryStore`] and a [`StubImageHost`].
    #[must_use]
    pub fn test_state(store: MemoryStore, images: StubImageHost) -> AppState {
        let images: Arc<dyn ImageHost> = Arc::new(images);
        AppState::with_hasher(
            test_config(),
            Repositories::from_store(store),
            images,
            PasswordHasher::fast_insecure(),
        )
    }
}
