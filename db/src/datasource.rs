//! Request handling on top of the connection registry.
//!
//! A `Datasource` is built once per process and shared by every request. It
//! owns the connection registry, the retrying executor and the stream bridge.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{Connector, ScriptTask, StreamClient};
use crate::cache::ConnectionRegistry;
use crate::config::ConnectionConfig;
use crate::error::DatasourceError;
use crate::executor::{RetryPolicy, RetryingExecutor, close_quietly};
use crate::stream::StreamEventBridge;
use crate::transform::{transform_to_table, transform_to_values};
use crate::types::{Frame, ValuePair};

/// The JSON model of one panel query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryModel {
    pub query_text: String,
    pub ref_id: String,
    pub hide: bool,
    pub streaming: StreamingTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingTarget {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// One query of a request: its ref id and raw JSON model.
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub ref_id: String,
    pub json: Vec<u8>,
}

impl DataQuery {
    pub fn new(ref_id: impl Into<String>, json: impl Into<Vec<u8>>) -> Self {
        Self {
            ref_id: ref_id.into(),
            json: json.into(),
        }
    }
}

/// Frames for one query, or the reason it produced none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    pub fn frames(frames: Vec<Frame>) -> Self {
        Self { frames, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Responses keyed by ref id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryDataResponse {
    pub responses: BTreeMap<String, DataResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheckResult {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetricFindQuery {
    #[serde(default)]
    query: String,
}

pub struct Datasource {
    executor: Arc<RetryingExecutor>,
    bridge: StreamEventBridge,
}

impl Datasource {
    pub fn new(connector: Arc<dyn Connector>, stream_client: Arc<dyn StreamClient>) -> Self {
        Self::with_policy(connector, stream_client, RetryPolicy::default())
    }

    pub fn with_policy(
        connector: Arc<dyn Connector>,
        stream_client: Arc<dyn StreamClient>,
        policy: RetryPolicy,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(connector));
        let executor = Arc::new(RetryingExecutor::with_policy(registry, policy));
        let bridge = StreamEventBridge::new(Arc::clone(&executor), stream_client);
        Self { executor, bridge }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.executor.registry()
    }

    /// Run every visible query as one batch and build a frame per query.
    ///
    /// Bad settings or a batch that fails after all retries abort the whole
    /// request. Per-query problems become error responses.
    pub fn query_data(
        &self,
        identity: &str,
        settings_json: &[u8],
        queries: &[DataQuery],
    ) -> Result<QueryDataResponse, DatasourceError> {
        let config = ConnectionConfig::from_json(settings_json)?;
        let mut response = QueryDataResponse::default();

        let mut tasks = Vec::with_capacity(queries.len());
        for query in queries {
            let model: QueryModel = match serde_json::from_slice(&query.json) {
                Ok(model) => model,
                Err(e) => {
                    warn!(identity, ref_id = %query.ref_id, error = %e, "bad query json");
                    response
                        .responses
                        .insert(query.ref_id.clone(), DataResponse::error(format!("json unmarshal: {}", e)));
                    continue;
                }
            };
            if model.hide {
                debug!(identity, ref_id = %query.ref_id, "skipping hidden query");
                continue;
            }
            tasks.push(Arc::new(ScriptTask::new(&query.ref_id, model.query_text)));
        }

        if tasks.is_empty() {
            return Ok(response);
        }
        info!(identity, queries = tasks.len(), "running query batch");
        self.executor.run_batch(&tasks, identity, &config)?;

        for task in &tasks {
            let result = match (task.result(), task.error()) {
                (Some(dataform), _) => {
                    match transform_to_table(&dataform, &format!("Response {}", task.ref_id())) {
                        Ok(frame) => DataResponse::frames(vec![frame]),
                        Err(e) => DataResponse::error(format!("error transforming dataform: {}", e)),
                    }
                }
                (None, error) => DataResponse::error(format!(
                    "error run query task: {}",
                    error.unwrap_or_default()
                )),
            };
            response.responses.insert(task.ref_id().to_string(), result);
        }
        Ok(response)
    }

    /// Connect on the single-connection path and run `1`.
    pub fn check_health(&self, identity: &str, settings_json: &[u8]) -> HealthCheckResult {
        let config = match ConnectionConfig::from_json(settings_json) {
            Ok(config) => config,
            Err(e) => {
                warn!(identity, error = %e, "health check settings rejected");
                return HealthCheckResult::error("Settings parse error");
            }
        };

        let registry = self.registry();
        let conn = match registry.acquire_single(identity, &config) {
            Ok(conn) => conn,
            Err(e) => return HealthCheckResult::error(format!("Database connect error: {}", detail(&e))),
        };

        if let Err(e) = conn.run_script("1") {
            close_quietly(identity, conn.as_ref());
            registry.singles().invalidate_if_same(identity, &conn);
            return HealthCheckResult::error(format!("Database test error: {}", e));
        }

        HealthCheckResult {
            status: HealthStatus::Ok,
            message: "Data source is working".to_string(),
        }
    }

    /// Resolve a variable query (`{"query": ...}`) to text/value pairs.
    pub fn metric_find_query(
        &self,
        identity: &str,
        settings_json: &[u8],
        body_json: &[u8],
    ) -> Result<Vec<ValuePair>, DatasourceError> {
        let config = ConnectionConfig::from_json(settings_json)?;
        let body: MetricFindQuery = serde_json::from_slice(body_json).map_err(DatasourceError::Request)?;

        let task = Arc::new(ScriptTask::new("metricFindQuery", body.query));
        self.executor
            .run_batch(std::slice::from_ref(&task), identity, &config)
            .inspect_err(|e| error!(identity, error = %e, "metric find query failed"))?;

        match task.result() {
            Some(dataform) => transform_to_values(&dataform),
            None => Err(DatasourceError::execution(task.error().unwrap_or_default())),
        }
    }

    /// Subscribe to the query's streaming table and forward rows to `sink`
    /// as frames named `Stream <refId>` until `cancel` fires.
    pub async fn run_stream<F>(
        &self,
        identity: &str,
        settings_json: &[u8],
        query_json: &[u8],
        cancel: CancellationToken,
        sink: F,
    ) -> Result<(), DatasourceError>
    where
        F: FnMut(Frame),
    {
        let query: QueryModel = serde_json::from_slice(query_json).map_err(DatasourceError::Request)?;
        let config = ConnectionConfig::from_json(settings_json)?;

        let subscription = self
            .bridge
            .bridge_stream(&query.streaming.table, identity, &config)?;
        subscription
            .forward(cancel, &format!("Stream {}", query.ref_id), sink)
            .await
    }

    /// Close every cached connection.
    pub fn dispose(&self) {
        self.registry().close_all();
    }
}

fn detail(e: &DatasourceError) -> String {
    match e {
        DatasourceError::Connection { message } | DatasourceError::Execution { message } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mem::{MemConnector, MemRow, MemStreamClient};
    use crate::types::{DataForm, DataType, Scalar, Table, Vector};
    use rstest::{fixture, rstest};

    const SETTINGS: &[u8] =
        br#"{"url":"host:1","username":"a","password":"b","poolCapacity":"5"}"#;

    fn table() -> DataForm {
        DataForm::Table(Table::new(vec![
            ("sym".to_string(), Vector::new(DataType::Symbol, vec!["A".into(), "B".into()])),
            ("px".to_string(), Vector::new(DataType::Double, vec![1.0.into(), 2.0.into()])),
        ]))
    }

    fn symbols() -> DataForm {
        DataForm::Vector(Vector::new(DataType::Symbol, vec!["x".into(), "y".into()]))
    }

    struct Fixture {
        connector: MemConnector,
        client: Arc<MemStreamClient>,
        datasource: Datasource,
    }

    #[fixture]
    fn fx() -> Fixture {
        let connector = MemConnector::new()
            .with_script("select * from t", table())
            .with_script("symbols", symbols())
            .with_script("1", DataForm::Scalar(Scalar::new(DataType::Int, 1)))
            .with_script("select top 1 * from t", table());
        let client = Arc::new(MemStreamClient::new());
        let datasource = Datasource::new(Arc::new(connector.clone()), client.clone());
        Fixture { connector, client, datasource }
    }

    fn query(ref_id: &str, text: &str) -> DataQuery {
        DataQuery::new(
            ref_id,
            format!(r#"{{"refId":"{}","queryText":"{}"}}"#, ref_id, text),
        )
    }

    #[rstest]
    fn test_query_data_builds_frames(fx: Fixture) {
        let queries = vec![query("A", "select * from t"), query("B", "1")];
        let response = fx.datasource.query_data("ds1", SETTINGS, &queries).unwrap();

        let a = &response.responses["A"];
        assert!(a.error.is_none());
        assert_eq!(a.frames[0].name, "Response A");
        assert_eq!(a.frames[0].field_names(), vec!["sym", "px"]);

        let b = &response.responses["B"];
        assert_eq!(
            b.error.as_deref().unwrap(),
            "error transforming dataform: unable to determine the data type of dataform (scalar)"
        );
        assert_eq!(fx.connector.executions(), 1);
    }

    #[rstest]
    fn test_hidden_and_malformed_queries(fx: Fixture) {
        let queries = vec![
            DataQuery::new("A", r#"{"refId":"A","queryText":"select * from t","hide":true}"#),
            DataQuery::new("B", "{not json"),
            query("C", "select * from t"),
        ];
        let response = fx.datasource.query_data("ds1", SETTINGS, &queries).unwrap();

        assert!(!response.responses.contains_key("A"));
        assert!(response.responses["B"].error.as_deref().unwrap().starts_with("json unmarshal:"));
        assert!(response.responses["C"].error.is_none());
    }

    #[rstest]
    fn test_only_hidden_queries_skip_execution(fx: Fixture) {
        let queries = vec![DataQuery::new("A", r#"{"queryText":"x","hide":true}"#)];
        let response = fx.datasource.query_data("ds1", SETTINGS, &queries).unwrap();
        assert!(response.responses.is_empty());
        assert_eq!(fx.connector.pools_created(), 0);
    }

    #[rstest]
    fn test_bad_settings_abort_request(fx: Fixture) {
        let err = fx
            .datasource
            .query_data("ds1", b"[]", &[query("A", "1")])
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Config(_)));
    }

    #[rstest]
    fn test_failing_batch_aborts_request(fx: Fixture) {
        let err = fx
            .datasource
            .query_data("ds1", SETTINGS, &[query("A", "missing")])
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Execution { .. }));
        assert_eq!(fx.connector.executions(), 3);
    }

    #[rstest]
    fn test_health_ok(fx: Fixture) {
        let result = fx.datasource.check_health("ds1", SETTINGS);
        assert_eq!(result.status, HealthStatus::Ok);
        assert_eq!(result.message, "Data source is working");
    }

    #[rstest]
    fn test_health_settings_error(fx: Fixture) {
        let result = fx.datasource.check_health("ds1", b"not json");
        assert_eq!(result, HealthCheckResult::error("Settings parse error"));
    }

    #[rstest]
    fn test_health_connect_error(fx: Fixture) {
        fx.connector.fail_next_connects(1);
        let result = fx.datasource.check_health("ds1", SETTINGS);
        assert_eq!(result.status, HealthStatus::Error);
        assert!(result.message.starts_with("Database connect error: connection to host:1 refused"));
    }

    #[rstest]
    fn test_health_script_error_evicts(fx: Fixture) {
        fx.connector.fail_next_scripts(1);
        let result = fx.datasource.check_health("ds1", SETTINGS);
        assert_eq!(result.status, HealthStatus::Error);
        assert!(result.message.starts_with("Database test error:"));
        assert!(!fx.datasource.registry().singles().contains("ds1"));
        assert_eq!(fx.connector.closed_singles(), 1);

        assert_eq!(fx.datasource.check_health("ds1", SETTINGS).status, HealthStatus::Ok);
    }

    #[rstest]
    fn test_metric_find_query(fx: Fixture) {
        let values = fx
            .datasource
            .metric_find_query("ds1", SETTINGS, br#"{"query":"symbols"}"#)
            .unwrap();
        let texts: Vec<_> = values.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "y"]);
    }

    #[rstest]
    fn test_metric_find_query_rejects_multi_column_table(fx: Fixture) {
        let err = fx
            .datasource
            .metric_find_query("ds1", SETTINGS, br#"{"query":"select * from t"}"#)
            .unwrap_err();
        assert!(matches!(err, DatasourceError::AmbiguousSelection { columns: 2 }));
    }

    #[rstest]
    fn test_metric_find_query_bad_body(fx: Fixture) {
        let err = fx
            .datasource
            .metric_find_query("ds1", SETTINGS, b"{")
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Request(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_stream_forwards_until_cancelled(fx: Fixture) {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let client = Arc::clone(&fx.client);
        let pusher = tokio::spawn(async move {
            while client.active().is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            let row = MemRow::new()
                .with("sym", DataForm::Scalar(Scalar::new(DataType::Symbol, "Z")))
                .with("px", DataForm::Scalar(Scalar::new(DataType::Double, 9.5)));
            client.push("t", &row);
        });

        let mut frames = Vec::new();
        fx.datasource
            .run_stream(
                "ds1",
                SETTINGS,
                br#"{"refId":"A","streaming":{"table":"t"}}"#,
                cancel,
                |frame| {
                    frames.push(frame);
                    stop.cancel();
                },
            )
            .await
            .unwrap();
        pusher.await.unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "Stream A");
        assert_eq!(frames[0].field_names(), vec!["sym", "px"]);
        assert_eq!(fx.client.unsubscribed().len(), 1);
    }

    #[rstest]
    fn test_dispose_closes_connections(fx: Fixture) {
        fx.datasource.check_health("ds1", SETTINGS);
        fx.datasource.query_data("ds1", SETTINGS, &[query("A", "select * from t")]).unwrap();
        fx.datasource.dispose();
        assert_eq!(fx.connector.closed_pools(), 1);
        assert_eq!(fx.connector.closed_singles(), 1);
    }
}
