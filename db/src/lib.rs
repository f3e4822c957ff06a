//! Data access layer for DolphinDB - cached connections, retrying execution
//! and conversion of dataforms into typed columns

pub mod backend;
pub mod cache;
pub mod config;
pub mod convert;
pub mod datasource;
pub mod error;
pub mod executor;
pub mod stream;
pub mod transform;
pub mod types;

// Re-export commonly used items
pub use backend::{
    BackendError, Closeable, Connector, MessageHandler, PooledConnection, ScriptTask,
    SingleConnection, StreamClient, StreamMessage, SubscribeRequest, TaskState,
};
pub use cache::{ConnectionCache, ConnectionRegistry};
pub use config::{ConfigError, ConnectionConfig};
pub use convert::{ConversionError, convert_column, convert_scalar, convert_value, convert_vector, is_null};
pub use datasource::{
    DataQuery, DataResponse, Datasource, HealthCheckResult, HealthStatus, QueryDataResponse,
    QueryModel,
};
pub use error::DatasourceError;
pub use executor::{RetryPolicy, RetryingExecutor};
pub use stream::{RowEvent, StreamEventBridge, StreamSubscription};
pub use transform::{transform_to_table, transform_to_values};
pub use types::{
    ColumnValues, DataForm, DataType, Frame, HostType, HostValue, RawValue, Scalar, Table,
    TypedColumn, ValuePair, Vector,
};
