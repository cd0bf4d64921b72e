use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::gateway::{Database, DatabaseError};
use crate::database::property_repository::PropertyRepository;
use crate::security::{Sanitizer, TracingAuditSink};
use crate::services::{AccountService, PropertyService};
use crate::session::SessionStore;
use crate::view::ViewEngine;

/// Shared application state: the pool-backed gateway, the session store and
/// the services constructed around them. Everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionStore>,
    pub sanitizer: Sanitizer,
    pub views: Arc<ViewEngine>,
    pub accounts: AccountService,
    pub properties: PropertyService,
}

impl AppState {
    /// Connect the store, provision tables and wire the services.
    pub async fn build(config: &AppConfig) -> Result<Self, DatabaseError> {
        let db = Database::connect(&config.database).await?;
        PropertyRepository::provision(&db).await?;

        let sanitizer = Sanitizer::new(
            Arc::new(TracingAuditSink),
            config.security.audit_value_cap,
        );
        let accounts = AccountService::new(
            db.clone(),
            sanitizer.clone(),
            config.security.bcrypt_cost,
        );
        let properties = PropertyService::new(
            PropertyRepository::new(db.clone()),
            sanitizer.clone(),
            config.security.recent_window_days,
        );

        Ok(Self {
            db,
            sessions: Arc::new(SessionStore::new()),
            sanitizer,
            views: Arc::new(ViewEngine),
            accounts,
            properties,
        })
    }
}
