//! Application state shared across handlers

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::auth::{AuthService, CookiePolicy, TokenIssuer};
use crate::db::{Database, UserStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub cookies: CookiePolicy,
    pub cookie_key: Key,
    pub db: Database,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        cookies: CookiePolicy,
        cookie_key: Key,
        db: Database,
    ) -> Self {
        Self {
            auth_service,
            cookies,
            cookie_key,
            db,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        self.auth_service.tokens()
    }

    pub fn users(&self) -> Arc<dyn UserStore> {
        self.auth_service.users()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

// Lets handlers extract `SignedCookieJar` directly.
impl FromRef<AppState> for Key {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.cookie_key.clone()
    }
}
