// Service modules
pub mod app_store_service;
pub mod document_store;
pub mod google_play_service;
pub mod jwt_service;
pub mod verification_service;

pub use app_store_service::AppStoreClient;
pub use document_store::{DocumentStore, MemoryDocumentStore, PostgresDocumentStore};
pub use google_play_service::GooglePlayClient;
pub use jwt_service::JWTService;
pub use verification_service::VerificationService;
