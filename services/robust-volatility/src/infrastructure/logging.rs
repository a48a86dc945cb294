/// ログ基盤モジュール
///
/// Lambda環境向けの構造化ログ設定を提供する。
/// tracingクレートを使用し、JSON形式での出力をサポートする。
/// フィルターはreloadレイヤー越しに保持し、呼び出し単位でdebugへ切り替えられる。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Once, OnceLock};

use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use super::logging_config::LoggingConfig;

/// ログサブスクライバー初期化用の同期プリミティブ
static INIT: Once = Once::new();

/// グローバルサブスクライバーのフィルター切り替え
static SAMPLER: OnceLock<DebugSampler> = OnceLock::new();

/// サンプリング対象の呼び出しで使うフィルター
const SAMPLED_DIRECTIVE: &str = "debug";

/// 差し替え可能なフィルターを持つJSONサブスクライバーを構築する
///
/// 戻り値のハンドルでフィルターを実行中に差し替えられる。
fn build_subscriber(
    config: &LoggingConfig,
) -> (
    impl Subscriber + Send + Sync + 'static,
    reload::Handle<EnvFilter, Registry>,
) {
    let (filter_layer, handle) = reload::Layer::new(EnvFilter::new(&config.directive));

    // JSON形式のログレイヤー（Lambda/CloudWatch向け）
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false);

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer);

    (subscriber, handle)
}

/// 呼び出し単位でフィルターをdebugと初期フィルターの間で切り替える
struct DebugSampler {
    handle: reload::Handle<EnvFilter, Registry>,
    base_directive: String,
    /// 現在debugフィルターに切り替わっているか
    active: AtomicBool,
}

impl DebugSampler {
    fn new(handle: reload::Handle<EnvFilter, Registry>, base_directive: impl Into<String>) -> Self {
        Self {
            handle,
            base_directive: base_directive.into(),
            active: AtomicBool::new(false),
        }
    }

    fn apply(&self, config: &LoggingConfig, request_id: &str) -> bool {
        let sampled = config.is_sampled(request_id);

        // 状態が変わらない場合は何もしない
        if self.active.swap(sampled, Ordering::SeqCst) == sampled {
            return sampled;
        }

        let directive = if sampled {
            SAMPLED_DIRECTIVE
        } else {
            self.base_directive.as_str()
        };
        if let Err(err) = self.handle.reload(EnvFilter::new(directive)) {
            tracing::warn!(error = %err, "ログフィルターの切り替えに失敗");
        }

        sampled
    }
}

/// Lambda環境向けのログサブスクライバーを初期化する
///
/// JSON形式での構造化ログ出力を設定し、`config.directive`でフィルタリングを行う。
///
/// この関数は複数回呼び出しても安全で、最初の呼び出しのみ初期化を実行する。
///
/// # 使用例
/// ```ignore
/// use robust_volatility::infrastructure::{init_logging_with, LoggingConfig};
///
/// init_logging_with(&LoggingConfig::from_env());
/// tracing::info!("Lambda function started");
/// ```
pub fn init_logging_with(config: &LoggingConfig) {
    INIT.call_once(|| {
        let (subscriber, handle) = build_subscriber(config);

        // 既に別のサブスクライバーが登録されている場合（テスト等）はハンドルを保持しない
        if subscriber.try_init().is_ok() {
            let _ = SAMPLER.set(DebugSampler::new(handle, config.directive.clone()));
        }
    });
}

/// 呼び出し単位でデバッグログのサンプリングを適用する
///
/// サンプリング対象ならフィルターをdebugに切り替え、対象外なら初期フィルターに戻す。
/// ロガー未初期化の場合はフィルターを変更しない。
///
/// # 戻り値
/// サンプリング対象かどうか
pub fn apply_debug_sampling(config: &LoggingConfig, request_id: &str) -> bool {
    match SAMPLER.get() {
        Some(sampler) => sampler.apply(config, request_id),
        None => config.is_sampled(request_id),
    }
}

/// テスト用のログサブスクライバーを初期化する（人間が読みやすい形式）
///
/// # 注意
/// この関数はテスト専用であり、本番環境では`init_logging_with`を使用すること。
#[cfg(test)]
pub fn init_test_logging() {
    static TEST_INIT: Once = Once::new();

    TEST_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .compact();

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });
}
