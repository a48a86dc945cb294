// Domain layer modules
pub mod daily_prices;
pub mod ewm_volatility;
pub mod robust_volatility;
pub mod vol_floor;
pub mod volatility_config;

// Re-exports
pub use daily_prices::{aggregate_to_daily, DailyPrice, PricePoint};
pub use ewm_volatility::{ewm_std, EwmParams};
pub use robust_volatility::{calculate, VolatilityPoint, RULE_NAME};
pub use vol_floor::{apply_min_vol, apply_vol_floor, rolling_quantile, FloorParams};
pub use volatility_config::{VolatilityConfig, VolatilityInput};
