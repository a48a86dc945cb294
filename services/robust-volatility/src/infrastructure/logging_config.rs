// ログ設定
//
// ログレベル、デバッグログのサンプリング率、受信イベントのログ出力有無を
// 環境変数から読み込む。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// ログレベルの環境変数（RUST_LOGが優先）
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// デバッグログをサンプリングする割合（0.0〜1.0）
pub const ENV_SAMPLE_RATE: &str = "LOGGER_SAMPLE_RATE";

/// 受信リクエストをログ出力するか
pub const ENV_LOG_EVENT: &str = "LOGGER_LOG_EVENT";

/// RUST_LOGもLOG_LEVELも未設定の場合のフィルター
pub const DEFAULT_DIRECTIVE: &str = "info";

/// サンプリング判定の分解能
const SAMPLE_BUCKETS: u64 = 10_000;

/// ログ設定
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// RUST_LOG形式のフィルターディレクティブ
    pub directive: String,
    /// デバッグログのサンプリング率
    pub sample_rate: f64,
    /// 受信リクエストをログ出力するか
    pub log_event: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_DIRECTIVE.to_string(),
            sample_rate: 0.0,
            log_event: false,
        }
    }
}

impl LoggingConfig {
    /// 環境変数から設定を読み込み
    ///
    /// ロガー初期化前に呼ばれるため、ここではログを出力しない。
    ///
    /// # 環境変数
    /// - RUST_LOG: フィルターディレクティブ（最優先）
    /// - LOG_LEVEL: `DEBUG`, `INFO`, `WARNING`等のログレベル
    /// - LOGGER_SAMPLE_RATE: デバッグログのサンプリング率（範囲外は丸める）
    /// - LOGGER_LOG_EVENT: `true`で受信リクエストをログ出力
    pub fn from_env() -> Self {
        let directive = non_empty_env("RUST_LOG")
            .or_else(|| non_empty_env(ENV_LOG_LEVEL).map(|level| level_to_directive(&level)))
            .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string());

        let sample_rate = non_empty_env(ENV_SAMPLE_RATE)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| !v.is_nan())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        let log_event = non_empty_env(ENV_LOG_EVENT)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Self {
            directive,
            sample_rate,
            log_event,
        }
    }

    /// リクエストIDがデバッグログのサンプリング対象か判定
    ///
    /// 同じリクエストIDに対しては常に同じ結果を返す。
    pub fn is_sampled(&self, request_id: &str) -> bool {
        if self.sample_rate <= 0.0 {
            return false;
        }
        if self.sample_rate >= 1.0 {
            return true;
        }

        let mut hasher = DefaultHasher::new();
        request_id.hash(&mut hasher);
        let bucket = hasher.finish() % SAMPLE_BUCKETS;

        (bucket as f64) < self.sample_rate * SAMPLE_BUCKETS as f64
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// ログレベル名をtracingのディレクティブに変換
///
/// 未知のレベル名はEnvFilterでターゲット名として解釈されてしまうため、
/// デフォルトのフィルターに置き換える。
fn level_to_directive(level: &str) -> String {
    let directive = match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => DEFAULT_DIRECTIVE,
    };
    directive.to_string()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
