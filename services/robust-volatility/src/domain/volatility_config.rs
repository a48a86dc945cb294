// ボラティリティ計算設定
//
// EWM標準偏差と下限処理のパラメータを保持し、
// 環境変数からの読み込みとデフォルト値を提供するドメイン層コンポーネント。

use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

use super::ewm_volatility::EwmParams;
use super::vol_floor::{FloorParams, DEFAULT_ABS_MIN_VOL};

// ===========================================
// デフォルト値定義
// ===========================================

/// EWMのスパン（日数）
pub const DEFAULT_SPAN: u32 = 35;

/// EWM標準偏差を出力するのに必要な最小観測数
pub const DEFAULT_MIN_PERIODS: u32 = 10;

/// 動的下限に使う分位点
pub const DEFAULT_FLOOR_QUANTILE: f64 = 0.05;

/// 動的下限を出力するのに必要な最小観測数
pub const DEFAULT_FLOOR_MIN_PERIODS: u32 = 100;

/// 動的下限のローリングウィンドウ長（日数）
pub const DEFAULT_FLOOR_WINDOW: u32 = 500;

// ===========================================
// 環境変数名定義
// ===========================================

pub const ENV_SPAN: &str = "VOL_SPAN";
pub const ENV_MIN_PERIODS: &str = "VOL_MIN_PERIODS";
pub const ENV_ABS_MIN: &str = "VOL_ABS_MIN";
pub const ENV_FLOOR_QUANTILE: &str = "VOL_FLOOR_QUANTILE";
pub const ENV_FLOOR_MIN_PERIODS: &str = "VOL_FLOOR_MIN_PERIODS";
pub const ENV_FLOOR_WINDOW: &str = "VOL_FLOOR_WINDOW";
pub const ENV_INPUT: &str = "VOL_INPUT";

/// EWM標準偏差の入力系列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolatilityInput {
    /// 日次価格そのもの
    #[default]
    Prices,
    /// 日次価格の前日差分
    Returns,
}

impl FromStr for VolatilityInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prices" | "price" => Ok(Self::Prices),
            "returns" | "return" => Ok(Self::Returns),
            other => Err(format!("unknown volatility input: {other}")),
        }
    }
}

/// ボラティリティ計算設定（ドメイン層）
///
/// Lambda実行環境の初期化時に一度だけ読み込まれる不変データ。
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityConfig {
    /// EWMのスパン
    pub span: u32,
    /// EWMの最小観測数
    pub min_periods: u32,
    /// ボラティリティの絶対下限
    pub abs_min: f64,
    /// 動的下限の分位点
    pub floor_quantile: f64,
    /// 動的下限の最小観測数
    pub floor_min_periods: u32,
    /// 動的下限のウィンドウ長
    pub floor_window: u32,
    /// EWMの入力系列
    pub input: VolatilityInput,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            span: DEFAULT_SPAN,
            min_periods: DEFAULT_MIN_PERIODS,
            abs_min: DEFAULT_ABS_MIN_VOL,
            floor_quantile: DEFAULT_FLOOR_QUANTILE,
            floor_min_periods: DEFAULT_FLOOR_MIN_PERIODS,
            floor_window: DEFAULT_FLOOR_WINDOW,
            input: VolatilityInput::default(),
        }
    }
}

impl VolatilityConfig {
    /// 環境変数から設定を読み込み
    ///
    /// 未設定、パースエラー、範囲外の値はデフォルト値を使用する。
    ///
    /// # 環境変数
    /// - VOL_SPAN: EWMのスパン（1以上）
    /// - VOL_MIN_PERIODS: EWMの最小観測数（1以上）
    /// - VOL_ABS_MIN: 絶対下限（正の値）
    /// - VOL_FLOOR_QUANTILE: 動的下限の分位点（0.0〜1.0）
    /// - VOL_FLOOR_MIN_PERIODS: 動的下限の最小観測数（1以上）
    /// - VOL_FLOOR_WINDOW: 動的下限のウィンドウ長（1以上）
    /// - VOL_INPUT: `prices` または `returns`
    pub fn from_env() -> Self {
        let positive = |v: &u32| *v > 0;

        let span = parse_env(ENV_SPAN, DEFAULT_SPAN, positive);
        let min_periods = parse_env(ENV_MIN_PERIODS, DEFAULT_MIN_PERIODS, positive);
        let abs_min = parse_env(ENV_ABS_MIN, DEFAULT_ABS_MIN_VOL, |v: &f64| {
            v.is_finite() && *v > 0.0
        });
        let floor_quantile = parse_env(ENV_FLOOR_QUANTILE, DEFAULT_FLOOR_QUANTILE, |v: &f64| {
            (0.0..=1.0).contains(v)
        });
        let floor_min_periods =
            parse_env(ENV_FLOOR_MIN_PERIODS, DEFAULT_FLOOR_MIN_PERIODS, positive);
        let floor_window = parse_env(ENV_FLOOR_WINDOW, DEFAULT_FLOOR_WINDOW, positive);
        let input = parse_env(ENV_INPUT, VolatilityInput::default(), |_| true);

        info!(
            span,
            min_periods,
            abs_min,
            floor_quantile,
            floor_min_periods,
            floor_window,
            input = ?input,
            "VolatilityConfig loaded"
        );

        Self {
            span,
            min_periods,
            abs_min,
            floor_quantile,
            floor_min_periods,
            floor_window,
            input,
        }
    }

    pub fn ewm_params(&self) -> EwmParams {
        EwmParams::new(self.span, self.min_periods)
    }

    pub fn floor_params(&self) -> FloorParams {
        FloorParams::new(self.floor_quantile, self.floor_min_periods, self.floor_window)
    }
}

/// 環境変数から値を読み込む
///
/// 未設定の場合、パースエラーや`is_valid`を満たさない場合はデフォルト値を返す。
fn parse_env<T, F>(key: &str, default: T, is_valid: F) -> T
where
    T: FromStr + Display + Copy,
    F: Fn(&T) -> bool,
{
    let Ok(value) = std::env::var(key) else {
        return default;
    };

    match value.trim().parse::<T>() {
        Ok(parsed) if is_valid(&parsed) => {
            info!(key, value = %parsed, "Environment variable loaded");
            parsed
        }
        _ => {
            warn!(
                key,
                value = %value,
                default = %default,
                "Environment variable invalid, using default"
            );
            default
        }
    }
}

impl Display for VolatilityInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prices => write!(f, "prices"),
            Self::Returns => write!(f, "returns"),
        }
    }
}
