// リクエストボディパーサー
//
// POSTボディのJSONから銘柄と開始時刻を取り出す。

use serde_json::Value;
use thiserror::Error;

/// ボラティリティ計算リクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatilityRequest {
    /// 銘柄名
    pub instrument: String,
    /// 開始UNIX時刻（秒）
    pub start_time: i64,
}

/// リクエストのパースエラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestParseError {
    /// ボディが空
    #[error("Request body is empty")]
    EmptyBody,

    /// JSONとして不正
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// ボディがJSONオブジェクトでない
    #[error("Request body must be a JSON object")]
    NotAnObject,

    /// 必須フィールドがない
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// フィールドの型・値が不正
    #[error("Invalid field {0}: {1}")]
    InvalidField(&'static str, String),
}

/// リクエストボディをパースする
///
/// - `instrument`: 空でない文字列
/// - `start_time`: 整数、小数（0方向に切り捨て）、整数を表す文字列のいずれか
pub fn parse_request(body: &[u8]) -> Result<VolatilityRequest, RequestParseError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RequestParseError::EmptyBody);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| RequestParseError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(RequestParseError::NotAnObject)?;

    let instrument = match object.get("instrument") {
        None | Some(Value::Null) => return Err(RequestParseError::MissingField("instrument")),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => {
            return Err(RequestParseError::InvalidField(
                "instrument",
                "must not be empty".to_string(),
            ));
        }
        Some(other) => {
            return Err(RequestParseError::InvalidField(
                "instrument",
                format!("expected string, got {other}"),
            ));
        }
    };

    let start_time = match object.get("start_time") {
        None | Some(Value::Null) => return Err(RequestParseError::MissingField("start_time")),
        Some(value) => parse_start_time(value)?,
    };

    Ok(VolatilityRequest {
        instrument,
        start_time,
    })
}

fn parse_start_time(value: &Value) -> Result<i64, RequestParseError> {
    let invalid = |reason: String| RequestParseError::InvalidField("start_time", reason);

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| f.is_finite())
                && f.trunc() >= i64::MIN as f64
                && f.trunc() <= i64::MAX as f64
            {
                Ok(f.trunc() as i64)
            } else {
                Err(invalid(format!("out of range: {n}")))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("not an integer: {s:?}"))),
        other => Err(invalid(format!("expected integer, got {other}"))),
    }
}
