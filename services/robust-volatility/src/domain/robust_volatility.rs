// ロバストボラティリティ系列の計算
//
// 価格行 -> 日次平均 -> EWM標準偏差 -> 絶対下限 -> 動的下限

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::daily_prices::{aggregate_to_daily, PricePoint};
use super::ewm_volatility::{daily_differences, ewm_std};
use super::vol_floor::{apply_min_vol, apply_vol_floor};
use super::volatility_config::{VolatilityConfig, VolatilityInput};

/// 計算ルール名（レスポンスの`rule`フィールド）
pub const RULE_NAME: &str = "Robust Volatility Series";

/// 日次ボラティリティ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPoint {
    /// UTC暦日
    pub date: NaiveDate,
    /// ボラティリティ（計算できない日は`None`）
    pub volatility: Option<f64>,
}

/// 価格行からロバストボラティリティ系列を計算する
///
/// 出力は最初の観測日から最後の観測日までの日次系列。
pub fn calculate(points: &[PricePoint], config: &VolatilityConfig) -> Vec<VolatilityPoint> {
    let daily = aggregate_to_daily(points);
    let prices: Vec<Option<f64>> = daily.iter().map(|d| d.price).collect();

    let input = match config.input {
        VolatilityInput::Prices => prices,
        VolatilityInput::Returns => daily_differences(&prices),
    };

    let vol = ewm_std(&input, config.ewm_params());
    let vol = apply_min_vol(&vol, config.abs_min);
    let vol = apply_vol_floor(&vol, config.floor_params());

    daily
        .iter()
        .zip(vol)
        .map(|(day, volatility)| VolatilityPoint {
            date: day.date,
            volatility,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::daily_prices::SECONDS_PER_DAY;

    const JAN_1: i64 = 1_672_531_200;

    fn daily_points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint::new(JAN_1 + i as i64 * SECONDS_PER_DAY, *p))
            .collect()
    }

    #[test]
    fn test_empty_prices_yield_empty_series() {
        assert!(calculate(&[], &VolatilityConfig::default()).is_empty());
    }

    #[test]
    fn test_series_covers_every_day() {
        let points = vec![
            PricePoint::new(JAN_1, 1.0),
            PricePoint::new(JAN_1 + 9 * SECONDS_PER_DAY, 2.0),
        ];

        let series = calculate(&points, &VolatilityConfig::default());

        assert_eq!(series.len(), 10);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(series[9].date, NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());
    }

    #[test]
    fn test_first_values_are_missing_until_min_periods() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + f64::from(i)).collect();
        let series = calculate(&daily_points(&prices), &VolatilityConfig::default());

        assert!(series[..9].iter().all(|p| p.volatility.is_none()));
        assert!(series[9..].iter().all(|p| p.volatility.is_some()));
    }

    /// 定数価格のボラティリティは絶対下限まで引き上げられる
    #[test]
    fn test_constant_prices_hit_absolute_minimum() {
        let series = calculate(&daily_points(&[50.0; 12]), &VolatilityConfig::default());

        assert_eq!(series[11].volatility, Some(0.000_000_000_1));
    }

    #[test]
    fn test_returns_input_uses_differences() {
        let config = VolatilityConfig {
            input: VolatilityInput::Returns,
            min_periods: 2,
            ..VolatilityConfig::default()
        };
        // 差分は一定（1.0）なのでボラティリティは絶対下限
        let prices: Vec<f64> = (0..5).map(f64::from).collect();
        let series = calculate(&daily_points(&prices), &config);

        assert_eq!(series[0].volatility, None);
        assert_eq!(series[1].volatility, None);
        assert_eq!(series[2].volatility, Some(config.abs_min));
    }

    #[test]
    fn test_serialized_point_uses_iso_date() {
        let point = VolatilityPoint {
            date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            volatility: None,
        };

        let json = serde_json::to_value(point).unwrap();

        assert_eq!(json["date"], "2023-01-02");
        assert!(json["volatility"].is_null());
    }
}
