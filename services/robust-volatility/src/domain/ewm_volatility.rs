// 指数加重移動標準偏差
//
// 日次系列から指数加重（EWM）の標準偏差を逐次計算する。
// 重みは調整付き（adjust）、分散は不偏補正付き。
// 欠損値は観測数に数えないが、古い重みの減衰には寄与する。

/// EWM計算パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwmParams {
    /// スパン（alpha = 2 / (span + 1)）
    pub span: u32,
    /// 値を出力するのに必要な最小観測数
    pub min_periods: u32,
}

impl EwmParams {
    pub fn new(span: u32, min_periods: u32) -> Self {
        Self { span, min_periods }
    }

    /// 平滑化係数
    pub fn alpha(&self) -> f64 {
        2.0 / (f64::from(self.span) + 1.0)
    }
}

/// 指数加重移動標準偏差を計算する
///
/// 出力長は入力長と同じ。観測数が`min_periods`未満の位置、
/// および不偏補正の分母が正にならない位置（観測が1件のみ等）は`None`。
pub fn ewm_std(values: &[Option<f64>], params: EwmParams) -> Vec<Option<f64>> {
    let min_periods = params.min_periods.max(1) as usize;
    let decay = 1.0 - params.alpha();
    // adjust=trueでは新しい観測の重みは常に1
    let new_weight = 1.0;

    let mut output = Vec::with_capacity(values.len());

    let mut mean: Option<f64> = None;
    let mut cov = 0.0;
    let mut sum_wt = 1.0;
    let mut sum_wt2 = 1.0;
    let mut old_wt = 1.0;
    let mut nobs = 0usize;

    for (i, value) in values.iter().enumerate() {
        let observed = value.filter(|v| !v.is_nan());
        if observed.is_some() {
            nobs += 1;
        }

        if i > 0 {
            match (mean, observed) {
                (Some(old_mean), cur) => {
                    sum_wt *= decay;
                    sum_wt2 *= decay * decay;
                    old_wt *= decay;

                    if let Some(cur) = cur {
                        let mut new_mean = old_mean;
                        // 定数系列で丸め誤差を出さない
                        if old_mean != cur {
                            new_mean = (old_wt * old_mean + new_weight * cur) / (old_wt + new_weight);
                        }
                        cov = (old_wt * (cov + (old_mean - new_mean) * (old_mean - new_mean))
                            + new_weight * (cur - new_mean) * (cur - new_mean))
                            / (old_wt + new_weight);
                        sum_wt += new_weight;
                        sum_wt2 += new_weight * new_weight;
                        old_wt += new_weight;
                        mean = Some(new_mean);
                    }
                }
                (None, Some(cur)) => mean = Some(cur),
                (None, None) => {}
            }
        } else {
            mean = observed;
        }

        let variance = if nobs >= min_periods {
            let numerator = sum_wt * sum_wt;
            let denominator = numerator - sum_wt2;
            (denominator > 0.0).then(|| numerator / denominator * cov)
        } else {
            None
        };

        output.push(variance.map(|v| v.max(0.0).sqrt()));
    }

    output
}

/// 日次系列を前日差分に変換する
///
/// 先頭要素、および欠損日に隣接する差分は`None`。
pub fn daily_differences(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut output = Vec::with_capacity(values.len());
    let mut previous: Option<f64> = None;

    for value in values {
        let diff = match (previous, value) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        };
        output.push(diff);
        previous = *value;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("値が出力されていない");
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_alpha_from_span() {
        assert_eq!(EwmParams::new(3, 1).alpha(), 0.5);
        assert_eq!(EwmParams::new(35, 10).alpha(), 2.0 / 36.0);
    }

    #[test]
    fn test_output_length_matches_input() {
        let values = vec![Some(1.0); 20];
        assert_eq!(ewm_std(&values, EwmParams::new(35, 10)).len(), 20);
    }

    /// 2点の場合は重みに関係なく通常の標本標準偏差と一致する
    #[test]
    fn test_two_points_equal_sample_std() {
        let result = ewm_std(&[Some(1.0), Some(2.0)], EwmParams::new(3, 1));

        // 観測1件では不偏補正できない
        assert_eq!(result[0], None);
        assert_close(result[1], 0.5_f64.sqrt());
    }

    #[test]
    fn test_min_periods_suppresses_early_values() {
        let values: Vec<Option<f64>> = (0..12).map(|i| Some(f64::from(i))).collect();
        let result = ewm_std(&values, EwmParams::new(35, 10));

        assert!(result[..9].iter().all(Option::is_none));
        assert!(result[9..].iter().all(Option::is_some));
    }

    #[test]
    fn test_constant_series_has_zero_volatility() {
        let values = vec![Some(42.0); 15];
        let result = ewm_std(&values, EwmParams::new(35, 10));

        for v in &result[9..] {
            assert_eq!(*v, Some(0.0));
        }
    }

    /// 欠損値は観測数に含めない
    #[test]
    fn test_missing_values_do_not_count_as_observations() {
        let values = vec![Some(1.0), None, None, Some(2.0)];
        let result = ewm_std(&values, EwmParams::new(3, 2));

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], None);
        assert!(result[3].is_some());
    }

    /// 欠損値でも古い重みは減衰する
    #[test]
    fn test_missing_values_still_decay_old_weights() {
        // span=3 (alpha=0.5): [1, None, 2]
        // 減衰後 old_wt=0.25, mean=(0.25*1+2)/1.25=1.8
        // cov=(0.25*0.64+0.04)/1.25=0.16, sum_wt=1.25, sum_wt2=1.0625
        // var=1.5625/0.5*0.16=0.5
        let result = ewm_std(&[Some(1.0), None, Some(2.0)], EwmParams::new(3, 1));
        assert_close(result[2], 0.5_f64.sqrt());
    }

    #[test]
    fn test_leading_missing_values_are_skipped() {
        let result = ewm_std(&[None, Some(1.0), Some(2.0)], EwmParams::new(3, 1));

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_close(result[2], 0.5_f64.sqrt());
    }

    #[test]
    fn test_daily_differences() {
        let values = vec![Some(1.0), Some(3.0), None, Some(4.0), Some(2.5)];
        let diffs = daily_differences(&values);

        assert_eq!(diffs, vec![None, Some(2.0), None, None, Some(-1.5)]);
    }
}
