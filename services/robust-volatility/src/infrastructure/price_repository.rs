/// DynamoDBから価格を取得するためのリポジトリ
///
/// テーブル構造:
/// - パーティションキー: `Instrument` (S)
/// - ソートキー: `UnixDateTime` (N)
/// - 属性: `Price` (N)
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::PricePoint;
use crate::infrastructure::DynamoDbConfig;

/// 価格リポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceRepositoryError {
    /// DynamoDBからの読み取りに失敗
    #[error("Read error: {0}")]
    ReadError(String),

    /// アイテムのデシリアライズに失敗
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// 価格取得用トレイト
///
/// 異なる実装を可能にする（実際のDynamoDB、テスト用モック）。
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// 銘柄の価格を期間指定で取得
    ///
    /// # 引数
    /// * `instrument` - 銘柄名
    /// * `start_time` - 開始UNIX時刻（秒、両端含む）
    /// * `end_time` - 終了UNIX時刻（秒、両端含む）
    ///
    /// # 戻り値
    /// * `Ok(Vec<PricePoint>)` - 時刻昇順の価格
    /// * `Err(PriceRepositoryError)` - 取得エラー
    async fn fetch_prices(
        &self,
        instrument: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<PricePoint>, PriceRepositoryError>;
}

/// PriceRepositoryのDynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoPriceRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoPriceRepository {
    /// DynamoDB設定から新しいリポジトリを作成
    pub fn new(config: &DynamoDbConfig) -> Self {
        Self {
            client: config.client().clone(),
            table_name: config.prices_table().to_string(),
        }
    }

    /// テーブル名を取得
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// DynamoDBアイテムを価格に変換
    fn decode_items(
        items: Vec<HashMap<String, AttributeValue>>,
    ) -> Result<Vec<PricePoint>, PriceRepositoryError> {
        serde_dynamo::from_items(items)
            .map_err(|e| PriceRepositoryError::DeserializationError(e.to_string()))
    }
}

#[async_trait]
impl PriceRepository for DynamoPriceRepository {
    async fn fetch_prices(
        &self,
        instrument: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<PricePoint>, PriceRepositoryError> {
        let mut prices = Vec::new();
        let mut last_evaluated_key = None;
        let mut pages = 0u32;

        // ページネーション: LastEvaluatedKeyがある限りクエリを続ける
        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#i = :i AND #t BETWEEN :s AND :e")
                .projection_expression("#t, #p")
                .expression_attribute_names("#i", "Instrument")
                .expression_attribute_names("#t", "UnixDateTime")
                .expression_attribute_names("#p", "Price")
                .expression_attribute_values(":i", AttributeValue::S(instrument.to_string()))
                .expression_attribute_values(":s", AttributeValue::N(start_time.to_string()))
                .expression_attribute_values(":e", AttributeValue::N(end_time.to_string()))
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .map_err(|e| {
                    let service_error = e.into_service_error();
                    error!(
                        table = %self.table_name,
                        instrument,
                        error = %service_error,
                        "価格の取得に失敗"
                    );
                    PriceRepositoryError::ReadError(service_error.to_string())
                })?;

            pages += 1;

            if let Some(items) = result.items {
                prices.extend(Self::decode_items(items)?);
            }

            // 次のページがあるか確認
            match result.last_evaluated_key {
                Some(key) => last_evaluated_key = Some(key),
                None => break,
            }
        }

        debug!(instrument, pages, count = prices.len(), "価格取得完了");

        Ok(prices)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::infrastructure::config::test_support::offline_client;
    use aws_sdk_dynamodb::operation::query::{QueryError, QueryOutput};
    use aws_sdk_dynamodb::types::error::ResourceNotFoundException;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_price_repository_error_display() {
        assert_eq!(
            PriceRepositoryError::ReadError("throttled".to_string()).to_string(),
            "Read error: throttled"
        );
        assert_eq!(
            PriceRepositoryError::DeserializationError("bad".to_string()).to_string(),
            "Deserialization error: bad"
        );
    }

    #[test]
    fn test_repository_uses_configured_table() {
        let config = DynamoDbConfig::new(offline_client(), "prices-table".to_string());
        let repo = DynamoPriceRepository::new(&config);

        assert_eq!(repo.table_name(), "prices-table");
    }

    #[test]
    fn test_decode_items() {
        let items = vec![
            HashMap::from([
                ("UnixDateTime".to_string(), AttributeValue::N("1672531200".to_string())),
                ("Price".to_string(), AttributeValue::N("1.0712".to_string())),
            ]),
            HashMap::from([
                ("UnixDateTime".to_string(), AttributeValue::N("1672534800".to_string())),
                ("Price".to_string(), AttributeValue::N("1.0725".to_string())),
            ]),
        ];

        let prices = DynamoPriceRepository::decode_items(items).unwrap();

        assert_eq!(
            prices,
            vec![
                PricePoint::new(1_672_531_200, 1.0712),
                PricePoint::new(1_672_534_800, 1.0725),
            ]
        );
    }

    #[test]
    fn test_decode_items_missing_price() {
        let items = vec![HashMap::from([(
            "UnixDateTime".to_string(),
            AttributeValue::N("1672531200".to_string()),
        )])];

        let result = DynamoPriceRepository::decode_items(items);

        assert!(matches!(
            result,
            Err(PriceRepositoryError::DeserializationError(_))
        ));
    }

    // ==================== Query / ページネーション ====================

    fn price_item(unix_time: &str, price: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("UnixDateTime".to_string(), AttributeValue::N(unix_time.to_string())),
            ("Price".to_string(), AttributeValue::N(price.to_string())),
        ])
    }

    fn mocked_repository(client: DynamoDbClient) -> DynamoPriceRepository {
        DynamoPriceRepository::new(&DynamoDbConfig::new(client, "prices-table".to_string()))
    }

    /// LastEvaluatedKeyを辿って全ページを時刻順に連結する
    #[tokio::test]
    async fn test_fetch_prices_follows_last_evaluated_key() {
        let last_key = HashMap::from([
            ("Instrument".to_string(), AttributeValue::S("EURUSD".to_string())),
            ("UnixDateTime".to_string(), AttributeValue::N("1672534800".to_string())),
        ]);

        let first_page = mock!(aws_sdk_dynamodb::Client::query)
            .match_requests(|req| {
                req.table_name() == Some("prices-table")
                    && req.key_condition_expression()
                        == Some("#i = :i AND #t BETWEEN :s AND :e")
                    && req.projection_expression() == Some("#t, #p")
                    && req.expression_attribute_values().is_some_and(|values| {
                        values.get(":i") == Some(&AttributeValue::S("EURUSD".to_string()))
                            && values.get(":s") == Some(&AttributeValue::N("1672531200".to_string()))
                            && values.get(":e") == Some(&AttributeValue::N("1672545600".to_string()))
                    })
                    && req.exclusive_start_key().is_none()
            })
            .then_output({
                let last_key = last_key.clone();
                move || {
                    QueryOutput::builder()
                        .set_items(Some(vec![
                            price_item("1672531200", "1.0712"),
                            price_item("1672534800", "1.0725"),
                        ]))
                        .set_last_evaluated_key(Some(last_key.clone()))
                        .build()
                }
            });

        let second_page = mock!(aws_sdk_dynamodb::Client::query)
            .match_requests(move |req| req.exclusive_start_key() == Some(&last_key))
            .then_output(|| {
                QueryOutput::builder()
                    .set_items(Some(vec![price_item("1672538400", "1.0731")]))
                    .build()
            });

        let client = mock_client!(
            aws_sdk_dynamodb,
            RuleMode::MatchAny,
            [&first_page, &second_page]
        );
        let repo = mocked_repository(client);

        let prices = repo
            .fetch_prices("EURUSD", 1_672_531_200, 1_672_545_600)
            .await
            .unwrap();

        assert_eq!(
            prices,
            vec![
                PricePoint::new(1_672_531_200, 1.0712),
                PricePoint::new(1_672_534_800, 1.0725),
                PricePoint::new(1_672_538_400, 1.0731),
            ]
        );
        assert_eq!(first_page.num_calls(), 1);
        assert_eq!(second_page.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_prices_empty_page() {
        let empty =
            mock!(aws_sdk_dynamodb::Client::query).then_output(|| QueryOutput::builder().build());
        let client = mock_client!(aws_sdk_dynamodb, [&empty]);
        let repo = mocked_repository(client);

        let prices = repo.fetch_prices("EURUSD", 0, 1).await.unwrap();

        assert!(prices.is_empty());
        assert_eq!(empty.num_calls(), 1);
    }

    /// サービスエラーはReadErrorに変換する
    #[tokio::test]
    async fn test_fetch_prices_service_error() {
        let not_found = mock!(aws_sdk_dynamodb::Client::query).then_error(|| {
            QueryError::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("Requested resource not found")
                    .build(),
            )
        });
        let client = mock_client!(aws_sdk_dynamodb, [&not_found]);
        let repo = mocked_repository(client);

        let result = repo.fetch_prices("EURUSD", 0, 1).await;

        match result {
            Err(PriceRepositoryError::ReadError(message)) => {
                assert!(message.contains("Requested resource not found"), "{message}");
            }
            other => panic!("ReadErrorを期待したが {other:?}"),
        }
    }

    /// 不正なアイテムはDeserializationErrorに変換する
    #[tokio::test]
    async fn test_fetch_prices_invalid_item() {
        let broken = mock!(aws_sdk_dynamodb::Client::query).then_output(|| {
            QueryOutput::builder()
                .set_items(Some(vec![HashMap::from([(
                    "UnixDateTime".to_string(),
                    AttributeValue::N("1672531200".to_string()),
                )])]))
                .build()
        });
        let client = mock_client!(aws_sdk_dynamodb, [&broken]);
        let repo = mocked_repository(client);

        let result = repo.fetch_prices("EURUSD", 0, 1_672_531_200).await;

        assert!(matches!(
            result,
            Err(PriceRepositoryError::DeserializationError(_))
        ));
    }

    // ==================== モック価格リポジトリ ====================

    /// ユニットテスト用のモックPriceRepository
    #[derive(Debug, Clone, Default)]
    pub struct MockPriceRepository {
        /// 銘柄 -> 価格
        prices: Arc<Mutex<HashMap<String, Vec<PricePoint>>>>,
        /// 次の操作で返すエラー（エラーパスのテスト用）
        next_error: Arc<Mutex<Option<PriceRepositoryError>>>,
        /// 受け取った呼び出し引数
        calls: Arc<Mutex<Vec<(String, i64, i64)>>>,
    }

    impl MockPriceRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, instrument: &str, points: Vec<PricePoint>) {
            self.prices
                .lock()
                .unwrap()
                .entry(instrument.to_string())
                .or_default()
                .extend(points);
        }

        pub fn set_next_error(&self, error: PriceRepositoryError) {
            *self.next_error.lock().unwrap() = Some(error);
        }

        pub fn calls(&self) -> Vec<(String, i64, i64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceRepository for MockPriceRepository {
        async fn fetch_prices(
            &self,
            instrument: &str,
            start_time: i64,
            end_time: i64,
        ) -> Result<Vec<PricePoint>, PriceRepositoryError> {
            self.calls
                .lock()
                .unwrap()
                .push((instrument.to_string(), start_time, end_time));

            if let Some(error) = self.next_error.lock().unwrap().take() {
                return Err(error);
            }

            let mut result: Vec<PricePoint> = self
                .prices
                .lock()
                .unwrap()
                .get(instrument)
                .map(|points| {
                    points
                        .iter()
                        .filter(|p| (start_time..=end_time).contains(&p.unix_time))
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            result.sort_by_key(|p| p.unix_time);

            Ok(result)
        }
    }

    #[tokio::test]
    async fn test_mock_repo_filters_by_range() {
        let repo = MockPriceRepository::new();
        repo.insert(
            "EURUSD",
            vec![
                PricePoint::new(300, 3.0),
                PricePoint::new(100, 1.0),
                PricePoint::new(200, 2.0),
            ],
        );

        let prices = repo.fetch_prices("EURUSD", 150, 300).await.unwrap();

        assert_eq!(prices, vec![PricePoint::new(200, 2.0), PricePoint::new(300, 3.0)]);
        assert_eq!(repo.calls(), vec![("EURUSD".to_string(), 150, 300)]);
    }

    #[tokio::test]
    async fn test_mock_repo_error() {
        let repo = MockPriceRepository::new();
        repo.set_next_error(PriceRepositoryError::ReadError("down".to_string()));

        let result = repo.fetch_prices("EURUSD", 0, 1).await;

        assert_eq!(result, Err(PriceRepositoryError::ReadError("down".to_string())));
        // エラーは1回だけ返す
        assert!(repo.fetch_prices("EURUSD", 0, 1).await.is_ok());
    }
}
