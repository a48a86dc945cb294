/// ロバストボラティリティ計算ハンドラー
///
/// リクエストをパースし、価格リポジトリから期間内の価格を取得して
/// ボラティリティ系列を計算し、HTTPレスポンスを構築する。
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::api_error::{json_response, ApiError};
use crate::application::request_parser::{parse_request, RequestParseError, VolatilityRequest};
use crate::application::router::{route, Route, ALLOWED_METHODS};
use crate::domain::{calculate, VolatilityConfig, VolatilityPoint, RULE_NAME};
use crate::infrastructure::{PriceRepository, PriceRepositoryError};

/// 価格取得失敗時にクライアントへ返すメッセージ
pub const PRICE_RETRIEVAL_ERROR_MESSAGE: &str =
    "Error occurred while retrieving prices from DynamoDB";

/// ハンドラーのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolatilityHandlerError {
    /// リクエストボディが不正
    #[error(transparent)]
    InvalidRequest(#[from] RequestParseError),

    /// 開始時刻が現在時刻より後
    #[error("start_time {start_time} is in the future (now: {now})")]
    StartTimeInFuture { start_time: i64, now: i64 },

    /// 期間内に価格がない
    #[error("No prices found for instrument {0}")]
    NoPrices(String),

    /// 価格リポジトリのエラー
    #[error(transparent)]
    Repository(#[from] PriceRepositoryError),

    /// レスポンスのシリアライズに失敗
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VolatilityHandlerError {
    /// APIエラーに変換
    ///
    /// 内部エラーの詳細はクライアントに返さない。
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::InvalidRequest(_) | Self::StartTimeInFuture { .. } => {
                ApiError::bad_request(self.to_string())
            }
            Self::NoPrices(_) => ApiError::not_found(self.to_string()),
            Self::Repository(_) => ApiError::internal_error(PRICE_RETRIEVAL_ERROR_MESSAGE),
            Self::Serialization(_) => ApiError::internal_error("Internal server error"),
        }
    }
}

/// ボラティリティ計算レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityResponse {
    /// 計算ルール名
    pub rule: String,
    /// 銘柄名
    pub instrument: String,
    /// 日次ボラティリティ系列
    pub series: Vec<VolatilityPoint>,
}

/// リクエストを検証してパース済みリクエストを返す
///
/// メソッドとパスのルーティング（404/405）とボディのパース（400）だけを行い、
/// 価格リポジトリには触れない。
///
/// # 引数
/// * `method` - HTTPメソッド
/// * `path` - ステージを含まないリソースパス
/// * `body` - リクエストボディ
pub fn accept_request(
    method: &Method,
    path: &str,
    body: &[u8],
) -> Result<VolatilityRequest, ApiError> {
    match route(method, path) {
        Route::RobustVolatility => {}
        Route::MethodNotAllowed => {
            warn!(method = %method, path, "許可されていないメソッド");
            return Err(ApiError::method_not_allowed(ALLOWED_METHODS));
        }
        Route::NotFound => {
            warn!(method = %method, path, "ルートが見つからない");
            return Err(ApiError::not_found(format!("No route for {method} {path}")));
        }
    }

    parse_request(body).map_err(|err| {
        let err = VolatilityHandlerError::from(err);
        info!(error = %err, "リクエストを処理できない");
        err.to_api_error()
    })
}

/// ボラティリティ計算ハンドラー
pub struct VolatilityHandler<R>
where
    R: PriceRepository,
{
    /// 価格リポジトリ
    price_repo: R,
    /// 計算設定
    config: VolatilityConfig,
}

impl<R> VolatilityHandler<R>
where
    R: PriceRepository,
{
    /// 新しいVolatilityHandlerを作成
    pub fn new(price_repo: R, config: VolatilityConfig) -> Self {
        Self { price_repo, config }
    }

    /// パース済みリクエストを処理してHTTPレスポンスを返す
    ///
    /// 成功時は200 OKでJSONを返却し、失敗時はエラー種別に応じて404/400/500を返す。
    pub async fn respond(&self, request: &VolatilityRequest, now: i64) -> Response<Body> {
        let result = self.calculate(request, now).await.and_then(|response| {
            serde_json::to_string(&response)
                .map_err(|e| VolatilityHandlerError::Serialization(e.to_string()))
        });

        match result {
            Ok(json) => json_response(StatusCode::OK, json),
            Err(err) => {
                match &err {
                    VolatilityHandlerError::Repository(_)
                    | VolatilityHandlerError::Serialization(_) => {
                        error!(error = %err, "ボラティリティ計算失敗");
                    }
                    _ => info!(error = %err, "リクエストを処理できない"),
                }
                err.to_api_error().into_response()
            }
        }
    }

    /// ボラティリティ系列を計算
    ///
    /// # 引数
    /// * `request` - パース済みリクエスト
    /// * `now` - 期間の終端とする現在UNIX時刻（秒）
    pub async fn calculate(
        &self,
        request: &VolatilityRequest,
        now: i64,
    ) -> Result<VolatilityResponse, VolatilityHandlerError> {
        if request.start_time > now {
            return Err(VolatilityHandlerError::StartTimeInFuture {
                start_time: request.start_time,
                now,
            });
        }

        info!(
            instrument = %request.instrument,
            start_time = request.start_time,
            end_time = now,
            "ボラティリティ計算開始"
        );

        let prices = self
            .price_repo
            .fetch_prices(&request.instrument, request.start_time, now)
            .await?;

        if prices.is_empty() {
            return Err(VolatilityHandlerError::NoPrices(request.instrument.clone()));
        }

        let series = calculate(&prices, &self.config);

        debug!(
            instrument = %request.instrument,
            prices = prices.len(),
            days = series.len(),
            "ボラティリティ計算完了"
        );

        Ok(VolatilityResponse {
            rule: RULE_NAME.to_string(),
            instrument: request.instrument.clone(),
            series,
        })
    }
}
