// HTTPルーティング
//
// API Gatewayから届いたメソッドとパスを計算ルートに振り分ける。

use lambda_http::http::Method;

/// ボラティリティ計算ルート
pub const VOLATILITY_PATH: &str = "/robust_volatility";

/// 旧ハンドラー名と同じパス（互換用）
pub const VOLATILITY_PATH_ALIAS: &str = "/robust_volatility_calculation";

/// 計算ルートで許可するメソッド
pub const ALLOWED_METHODS: &str = "POST";

/// ルーティング結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// ボラティリティ計算
    RobustVolatility,
    /// パスは一致するがメソッドが異なる
    MethodNotAllowed,
    /// 該当ルートなし
    NotFound,
}

/// メソッドとパスからルートを決定する
///
/// 末尾のスラッシュは無視する。
pub fn route(method: &Method, path: &str) -> Route {
    let trimmed = path.trim_end_matches('/');
    let known = trimmed == VOLATILITY_PATH || trimmed == VOLATILITY_PATH_ALIAS;

    match (known, method == Method::POST) {
        (true, true) => Route::RobustVolatility,
        (true, false) => Route::MethodNotAllowed,
        (false, _) => Route::NotFound,
    }
}
