// ボラティリティの下限処理
//
// 1. 絶対下限: 極小値を固定の最小値に引き上げる
// 2. 動的下限: 自身のローリング低位分位点を下回らないようにする

/// ボラティリティの絶対下限のデフォルト値
pub const DEFAULT_ABS_MIN_VOL: f64 = 0.000_000_000_1;

/// 動的下限の計算パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorParams {
    /// 下限とする分位点（0.0〜1.0）
    pub quantile: f64,
    /// 分位点を出力するのに必要な最小観測数
    pub min_periods: u32,
    /// ローリングウィンドウ長（日数）
    pub window: u32,
}

impl FloorParams {
    pub fn new(quantile: f64, min_periods: u32, window: u32) -> Self {
        Self {
            quantile,
            min_periods,
            window,
        }
    }
}

/// 絶対下限を適用する
///
/// `abs_min`未満の値を`abs_min`に置き換える。欠損値は欠損のまま。
pub fn apply_min_vol(series: &[Option<f64>], abs_min: f64) -> Vec<Option<f64>> {
    series
        .iter()
        .map(|v| v.map(|v| if v < abs_min { abs_min } else { v }))
        .collect()
}

/// ソート済みベクタから線形補間で分位点を求める
fn interpolated_quantile(sorted: &[f64], quantile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = quantile * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let fraction = position - lower as f64;

    if fraction == 0.0 || lower + 1 >= sorted.len() {
        return Some(sorted[lower.min(sorted.len() - 1)]);
    }
    Some(sorted[lower] + (sorted[lower + 1] - sorted[lower]) * fraction)
}

/// ソート済みベクタへ値を挿入
fn sorted_insert(sorted: &mut Vec<f64>, value: f64) {
    let index = sorted.partition_point(|x| *x < value);
    sorted.insert(index, value);
}

/// ソート済みベクタから値を1つ削除
fn sorted_remove(sorted: &mut Vec<f64>, value: f64) {
    let index = sorted.partition_point(|x| *x < value);
    if index < sorted.len() && sorted[index] == value {
        sorted.remove(index);
    }
}

/// ローリング分位点を計算する
///
/// 各位置について直近`window`個の位置に含まれる値の分位点を返す。
/// 欠損値はウィンドウ長には数えるが観測数には数えない。
/// 観測数が`min_periods`未満の位置は`None`。
pub fn rolling_quantile(
    series: &[Option<f64>],
    window: u32,
    min_periods: u32,
    quantile: f64,
) -> Vec<Option<f64>> {
    let window = window.max(1) as usize;
    let min_periods = min_periods.max(1) as usize;
    let mut sorted: Vec<f64> = Vec::with_capacity(window);
    let mut output = Vec::with_capacity(series.len());

    for (i, value) in series.iter().enumerate() {
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            sorted_insert(&mut sorted, v);
        }
        // ウィンドウから外れた値を除去
        if i >= window
            && let Some(old) = series[i - window].filter(|v| !v.is_nan())
        {
            sorted_remove(&mut sorted, old);
        }

        let result = if sorted.len() >= min_periods {
            interpolated_quantile(&sorted, quantile)
        } else {
            None
        };
        output.push(result);
    }

    output
}

/// 動的下限を適用する
///
/// 下限系列はローリング分位点の先頭を0.0に固定した上で前方補完したもの。
/// 結果は各位置で`max(vol, 下限)`。ボラティリティが欠損の位置は欠損のまま。
pub fn apply_vol_floor(vol: &[Option<f64>], params: FloorParams) -> Vec<Option<f64>> {
    let floor = rolling_quantile(vol, params.window, params.min_periods, params.quantile);

    let mut current_floor = 0.0;
    vol.iter()
        .zip(floor)
        .enumerate()
        .map(|(i, (v, f))| {
            // 先頭は常に0.0、以降は直近の有効な分位点を引き継ぐ
            if i > 0
                && let Some(f) = f
            {
                current_floor = f;
            }
            v.map(|v| v.max(current_floor))
        })
        .collect()
}
