//! services/storefront/src/app.rs
//!
//! Wires the core components to the concrete adapters and implements the
//! user-facing flows the binary exposes. Output goes to any `Write` so the
//! flows can be exercised against a buffer.

use std::io::Write;
use std::sync::Arc;
use storefront_core::domain::{LoginRequest, Product, SignupRequest, WishlistItem};
use storefront_core::ports::{ElementHandle, HttpTransport, SessionStore};
use storefront_core::{
    ApiClient, AsyncOperation, AuthSessionStore, InfiniteScroll, LoadOutcome, ManualVisibility,
};
use tracing::{info, warn};

use crate::adapters::{FileSessionStore, ReqwestTransport};
use crate::config::Config;
use crate::error::AppError;
use crate::ui::{product_card, wishlist_view, Toast};

//=========================================================================================
// Storefront (Shared Across All Commands)
//=========================================================================================

/// The client's shared state, created once at startup.
pub struct Storefront {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub auth: AuthSessionStore,
}

impl Storefront {
    /// Builds the client against the real network and token file.
    pub fn new(config: Arc<Config>) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.api_url.clone()));
        let tokens = Arc::new(FileSessionStore::new(config.token_path.clone()));
        Self::with_ports(config, transport, tokens)
    }

    pub fn with_ports(
        config: Arc<Config>,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn SessionStore>,
    ) -> Self {
        let api = ApiClient::new(transport, tokens.clone());
        let auth = AuthSessionStore::new(api.clone(), tokens);
        Self { config, api, auth }
    }

    /// Resolves any stored session. A stale token is dropped quietly; only a
    /// conflicting auth operation is reported.
    pub async fn restore_session(&self) -> Result<(), AppError> {
        let restored = self.auth.restore().await?;
        info!(restored, "Startup session resolution complete");
        Ok(())
    }

    //=====================================================================================
    // Account
    //=====================================================================================

    pub async fn health(&self) -> Result<Toast, AppError> {
        self.api.health().await?;
        Ok(Toast::success(format!("{} is up", self.config.api_url)))
    }

    pub async fn send_otp(&self, phone: &str) -> Result<Toast, AppError> {
        self.auth.send_otp(phone).await?;
        Ok(Toast::info(format!("A code was sent to {}", phone)))
    }

    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<Toast, AppError> {
        if self.auth.verify_otp(phone, otp).await? {
            Ok(Toast::success("Code is valid"))
        } else {
            Ok(Toast::error("That code is not valid"))
        }
    }

    pub async fn login(&self, phone: &str, otp: &str) -> Result<Toast, AppError> {
        let request = LoginRequest {
            phone: phone.to_string(),
            otp: otp.to_string(),
        };
        let user = self.auth.login(&request).await?;
        Ok(Toast::success(format!("Welcome back, {}", user.name)))
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<Toast, AppError> {
        let user = self.auth.signup(&request).await?;
        Ok(Toast::success(format!("Welcome, {}", user.name)))
    }

    pub async fn logout(&self) -> Result<Toast, AppError> {
        self.auth.logout().await?;
        Ok(Toast::info("Signed out"))
    }

    pub fn whoami(&self) -> Toast {
        match self.auth.session().user {
            Some(user) => Toast::info(format!(
                "Signed in as {} <{}> ({})",
                user.name, user.email, user.phone
            )),
            None => Toast::info("Not signed in"),
        }
    }

    //=====================================================================================
    // Catalog
    //=====================================================================================

    /// Renders up to `max_pages` catalog pages. Each rendered page reports its
    /// last card as the last element, then signals it visible to pull the next
    /// page. A failed page is retried once before giving up.
    ///
    /// Returns the number of products rendered.
    pub async fn browse<W: Write>(&self, max_pages: u32, out: &mut W) -> Result<usize, AppError> {
        let api = self.api.clone();
        let limit = self.config.page_size;
        let source = move |page: u32| {
            let api = api.clone();
            async move { api.products(page, limit).await }
        };
        let signal = ManualVisibility::new();
        let scroll: InfiniteScroll<Product> =
            InfiniteScroll::new(source, Arc::new(signal.clone()), self.config.scroll_threshold);

        let mut outcome = scroll.start().await;
        let mut retried = false;
        let mut pages_shown = 0;
        let mut rendered = 0;
        loop {
            match outcome {
                LoadOutcome::Fetched { .. } => retried = false,
                LoadOutcome::Failed if !retried => {
                    if let Some(e) = scroll.error() {
                        writeln!(out, "{}", Toast::from_error(&e))?;
                    }
                    warn!("Retrying page {}", scroll.snapshot().page);
                    retried = true;
                    outcome = scroll.retry().await;
                    continue;
                }
                LoadOutcome::Failed => {
                    scroll.dispose();
                    return Err(match scroll.error() {
                        Some(e) => AppError::Client(e),
                        None => AppError::Internal("page fetch failed".to_string()),
                    });
                }
                LoadOutcome::Skipped(_) => break,
            }

            pages_shown += 1;
            let items = scroll.items();
            for product in &items[rendered..] {
                writeln!(out, "{}\n", product_card(product))?;
            }
            rendered = items.len();

            if pages_shown >= max_pages || !scroll.has_more() {
                break;
            }
            let Some(last) = items.last() else {
                // Nothing rendered yet, so there is no element to observe.
                outcome = scroll.load_more().await;
                continue;
            };
            scroll.last_element(Some(ElementHandle::new(last.id.clone())));
            if signal.trigger().await == 0 {
                break;
            }
            outcome = match scroll.error() {
                Some(_) => LoadOutcome::Failed,
                None => LoadOutcome::Fetched {
                    count: scroll.items().len() - rendered,
                },
            };
        }

        if scroll.has_more() {
            writeln!(out, "{}", Toast::info(format!("Showing {} products, more available", rendered)))?;
        } else {
            writeln!(out, "{}", Toast::info(format!("End of catalog: {} products", rendered)))?;
        }
        scroll.dispose();
        Ok(rendered)
    }

    //=====================================================================================
    // Wishlist
    //=====================================================================================

    pub async fn wishlist(&self) -> Result<String, AppError> {
        let operation = AsyncOperation::<Vec<WishlistItem>>::new()
            .with_on_success(|items| info!(count = items.len(), "Wishlist loaded"));
        let items = operation.execute(|| self.api.wishlist()).await?;
        Ok(wishlist_view(&items))
    }

    pub async fn add_to_wishlist(&self, product_id: &str) -> Result<Toast, AppError> {
        let operation = AsyncOperation::<WishlistItem>::new()
            .with_on_success(|item| info!(product_id = %item.product.id, "Added to wishlist"));
        let item = operation
            .execute(|| self.api.add_to_wishlist(product_id))
            .await?;
        Ok(Toast::success(format!("Saved {} to your wishlist", item.product.name)))
    }

    pub async fn remove_from_wishlist(&self, product_id: &str) -> Result<Toast, AppError> {
        let operation = AsyncOperation::<()>::new();
        operation
            .execute(|| self.api.remove_from_wishlist(product_id))
            .await?;
        Ok(Toast::info(format!("Removed {} from your wishlist", product_id)))
    }
}
