// アプリケーション層モジュール
pub mod api_error;
pub mod request_parser;
pub mod router;
pub mod volatility_handler;

// 再エクスポート
pub use api_error::{ApiError, ApiErrorBody};
pub use request_parser::{parse_request, RequestParseError, VolatilityRequest};
pub use router::{route, Route};
pub use volatility_handler::{
    accept_request, VolatilityHandler, VolatilityHandlerError, VolatilityResponse,
};
