/// ロバストボラティリティ計算HTTP Lambdaエントリポイント
///
/// API Gateway (REST) の `POST /robust_volatility` を受け取り、
/// DynamoDBの価格からボラティリティ系列を計算してJSONで返却する。
use lambda_http::request::RequestContext;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use robust_volatility::application::{accept_request, ApiError, VolatilityHandler};
use robust_volatility::domain::VolatilityConfig;
use robust_volatility::infrastructure::{
    apply_debug_sampling, init_logging_with, DynamoDbConfig, DynamoDbConfigError,
    DynamoPriceRepository, LoggingConfig,
};
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use tracing::{error, info, Instrument};

/// VolatilityHandlerの静的インスタンス
///
/// Lambda warm start時にDynamoDBクライアントを再利用するため、
/// 一度初期化したハンドラーを静的に保持する。
static VOLATILITY_HANDLER: OnceCell<VolatilityHandler<DynamoPriceRepository>> =
    OnceCell::const_new();

/// 起動時に読み込んだログ設定
static LOGGING_CONFIG: OnceLock<LoggingConfig> = OnceLock::new();

/// VolatilityHandlerを取得（初期化されていなければ初期化）
async fn get_volatility_handler()
-> Result<&'static VolatilityHandler<DynamoPriceRepository>, DynamoDbConfigError> {
    VOLATILITY_HANDLER
        .get_or_try_init(|| async {
            let config = DynamoDbConfig::from_env().await?;
            info!(table = config.prices_table(), "価格リポジトリを初期化");
            Ok(VolatilityHandler::new(
                DynamoPriceRepository::new(&config),
                VolatilityConfig::from_env(),
            ))
        })
        .await
}

fn logging_config() -> &'static LoggingConfig {
    LOGGING_CONFIG.get_or_init(LoggingConfig::from_env)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging_with(logging_config());

    info!("ロバストボラティリティLambda関数を初期化");

    run(service_fn(handler)).await
}

/// API GatewayのリクエストID（相関ID）を取得
fn correlation_id(request: &Request) -> Option<String> {
    match request.request_context_ref()? {
        RequestContext::ApiGatewayV1(ctx) => ctx.request_id.clone(),
        _ => None,
    }
}

/// HTTPリクエストハンドラー
///
/// # 処理フロー
/// 1. 呼び出し単位のspanを作成（リクエストID、相関ID、X-RayトレースID）
/// 2. デバッグログのサンプリングを適用
/// 3. ルーティングとボディのパース（DynamoDBクライアントは不要）
/// 4. 有効なリクエストのみVolatilityHandlerに処理を委譲
///
/// リクエスト起因のエラーはすべてHTTPレスポンスとして返し、`Err`は返さない。
async fn handler(request: Request) -> Result<Response<Body>, Error> {
    let (request_id, xray_trace_id) = request
        .lambda_context_ref()
        .map(|ctx| (ctx.request_id.clone(), ctx.xray_trace_id.clone()))
        .unwrap_or_else(|| ("unknown".to_string(), None));
    let correlation_id = correlation_id(&request).unwrap_or_else(|| request_id.clone());

    let span = tracing::info_span!(
        "invocation",
        request_id = %request_id,
        correlation_id = %correlation_id,
        xray_trace_id = xray_trace_id.as_deref().unwrap_or("none"),
    );

    async move {
        let logging = logging_config();
        let sampled = apply_debug_sampling(logging, &request_id);

        // ステージ名を除いたパス（API Gateway以外ではURIのパス）
        let path = match request.raw_http_path() {
            "" => request.uri().path().to_string(),
            raw => raw.to_string(),
        };
        let method = request.method().clone();
        let body: &[u8] = request.body().as_ref();

        if logging.log_event {
            info!(
                method = %method,
                path = %path,
                body = %String::from_utf8_lossy(body),
                sampled,
                "リクエスト受信"
            );
        }

        let response = match accept_request(&method, &path, body) {
            Ok(volatility_request) => match get_volatility_handler().await {
                Ok(volatility_handler) => {
                    let now = chrono::Utc::now().timestamp();
                    volatility_handler.respond(&volatility_request, now).await
                }
                Err(err) => {
                    error!(error = %err, "DynamoDB設定読み込み失敗");
                    ApiError::internal_error("Internal server error").into_response()
                }
            },
            Err(api_error) => api_error.into_response(),
        };

        info!(status = response.status().as_u16(), "レスポンス送信");

        Ok(response)
    }
    .instrument(span)
    .await
}
