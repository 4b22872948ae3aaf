// Middleware modules
pub mod caller_auth;
pub mod logging;

// Export caller identity middleware
pub use caller_auth::caller_auth_middleware;

// Export logging middleware
pub use logging::logging_middleware;
