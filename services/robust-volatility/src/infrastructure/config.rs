/// DynamoDB接続設定
///
/// 価格テーブルへのクライアントとテーブル名を保持する。
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;

/// 価格テーブル名の環境変数
pub const ENV_PRICES_TABLE: &str = "PRICES_TABLE";

/// 価格テーブル名のデフォルト値
pub const DEFAULT_PRICES_TABLE: &str = "multiple_prices";

/// DynamoDB設定のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DynamoDbConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// テーブル名とクライアントを持つDynamoDB設定
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDBクライアントインスタンス
    client: DynamoDbClient,
    /// 価格テーブル名
    prices_table: String,
}

impl DynamoDbConfig {
    /// 環境からAWS設定を読み込み、価格テーブル名を読み取って新しいDynamoDbConfigを作成
    ///
    /// 環境変数:
    /// - AWS認証情報: aws-configにより自動読み込み
    /// - PRICES_TABLE: 価格テーブル名（未設定時は`multiple_prices`）
    pub async fn from_env() -> Result<Self, DynamoDbConfigError> {
        let prices_table = prices_table_from_env()?;

        // 環境からAWS設定を読み込み（認証情報、リージョンなど）
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = DynamoDbClient::new(&aws_config);

        Ok(Self {
            client,
            prices_table,
        })
    }

    /// 明示的な値で新しいDynamoDbConfigを作成（テスト用）
    pub fn new(client: DynamoDbClient, prices_table: String) -> Self {
        Self {
            client,
            prices_table,
        }
    }

    /// DynamoDBクライアントへの参照を取得
    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    /// 価格テーブル名を取得
    pub fn prices_table(&self) -> &str {
        &self.prices_table
    }
}

/// 環境変数から価格テーブル名を読み込む
///
/// 未設定の場合はデフォルト値、空白のみの場合はエラー。
fn prices_table_from_env() -> Result<String, DynamoDbConfigError> {
    match std::env::var(ENV_PRICES_TABLE) {
        Ok(value) if value.trim().is_empty() => Err(DynamoDbConfigError::InvalidEnvVar(
            ENV_PRICES_TABLE.to_string(),
            "empty table name".to_string(),
        )),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(DEFAULT_PRICES_TABLE.to_string()),
    }
}
