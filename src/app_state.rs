use crate::{
    config::Config,
    services::{
        AppStoreClient, DocumentStore, GooglePlayClient, JWTService, PostgresDocumentStore,
        VerificationService,
    },
};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jwt_service: Arc<JWTService>,
    pub verification_service: Arc<VerificationService>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
        // Connect to database and bring the schema up to date
        let db = sea_orm::Database::connect(&config.database.url).await?;
        Migrator::up(&db, None).await?;

        // Initialize services
        let store: Arc<dyn DocumentStore> = Arc::new(PostgresDocumentStore::new(db));
        let google_play = Arc::new(GooglePlayClient::from_config(&config.google_play)?);
        let app_store = Arc::new(AppStoreClient::new(&config.app_store)?);
        let verification_service = VerificationService::new(google_play, app_store, store);

        Ok(Self::from_parts(
            JWTService::new(&config.auth),
            verification_service,
        ))
    }

    /// Assemble state from already-built services
    pub fn from_parts(jwt_service: JWTService, verification_service: VerificationService) -> Self {
        Self {
            jwt_service: Arc::new(jwt_service),
            verification_service: Arc::new(verification_service),
        }
    }
}
