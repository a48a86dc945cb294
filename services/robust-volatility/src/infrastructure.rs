// Infrastructure layer modules
pub mod config;
pub mod logging;
pub mod logging_config;
pub mod price_repository;

// Re-exports
pub use config::{DynamoDbConfig, DynamoDbConfigError};
pub use logging::{apply_debug_sampling, init_logging_with};
pub use logging_config::LoggingConfig;
pub use price_repository::{DynamoPriceRepository, PriceRepository, PriceRepositoryError};
