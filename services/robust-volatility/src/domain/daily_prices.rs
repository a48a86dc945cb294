// 日次価格集計
//
// DynamoDBから取得した生の価格行をUTC暦日ごとの平均価格に集約する。
// 観測のない日も欠損値として系列に含め、暦日が連続した系列を返す。

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 1日の秒数
pub const SECONDS_PER_DAY: i64 = 86_400;

/// 価格テーブルの1行
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// UNIX時刻（秒）
    #[serde(rename = "UnixDateTime")]
    pub unix_time: i64,
    /// 価格
    #[serde(rename = "Price")]
    pub price: f64,
}

impl PricePoint {
    pub fn new(unix_time: i64, price: f64) -> Self {
        Self { unix_time, price }
    }
}

/// 日次平均価格
///
/// `price`が`None`の日はその日に観測がなかったことを示す。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyPrice {
    /// UTC暦日
    pub date: NaiveDate,
    /// その日の平均価格
    pub price: Option<f64>,
}

/// UNIX時刻（秒）をUTC暦日の通し番号に変換
fn day_index(unix_time: i64) -> i64 {
    unix_time.div_euclid(SECONDS_PER_DAY)
}

/// 暦日の通し番号を日付に変換
fn date_from_day_index(day: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(day * SECONDS_PER_DAY, 0).map(|dt| dt.date_naive())
}

/// 生の価格行を日次平均価格に集約する
///
/// - 入力の順序は問わない
/// - 有限値でない価格は無視する
/// - 最初の観測日から最後の観測日まで1日刻みで出力し、観測のない日は`None`
///
/// # 引数
/// * `points` - 価格行
///
/// # 戻り値
/// 日付昇順の日次価格（入力が空なら空）
pub fn aggregate_to_daily(points: &[PricePoint]) -> Vec<DailyPrice> {
    // 日ごとの(合計, 件数)
    let mut buckets: BTreeMap<i64, (f64, u32)> = BTreeMap::new();

    for point in points.iter().filter(|p| p.price.is_finite()) {
        let entry = buckets.entry(day_index(point.unix_time)).or_insert((0.0, 0));
        entry.0 += point.price;
        entry.1 += 1;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    (first..=last)
        .filter_map(|day| {
            let date = date_from_day_index(day)?;
            let price = buckets.get(&day).map(|(sum, count)| sum / f64::from(*count));
            Some(DailyPrice { date, price })
        })
        .collect()
}
