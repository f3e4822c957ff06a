//! Change-stream subscriptions republished as typed row events.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{MessageHandler, StreamClient, StreamMessage, SubscribeRequest};
use crate::config::ConnectionConfig;
use crate::convert::convert_scalar;
use crate::error::DatasourceError;
use crate::executor::RetryingExecutor;
use crate::types::{ColumnValues, DataForm, Frame, TypedColumn};

/// One pushed row: a single-row column per field that converted.
pub type RowEvent = Vec<TypedColumn>;

/// Subscribes to server-side tables and converts pushed rows.
pub struct StreamEventBridge {
    executor: Arc<RetryingExecutor>,
    client: Arc<dyn StreamClient>,
}

impl StreamEventBridge {
    pub fn new(executor: Arc<RetryingExecutor>, client: Arc<dyn StreamClient>) -> Self {
        Self { executor, client }
    }

    /// Subscribe to `table`, returning a handle that yields converted rows.
    ///
    /// The column layout comes from probing the first row of the table on the
    /// serial path. Each call uses a fresh random action name so concurrent
    /// subscriptions to the same table do not collide.
    pub fn bridge_stream(
        &self,
        table: &str,
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<StreamSubscription, DatasourceError> {
        let snapshot = self
            .executor
            .run_script(&format!("select top 1 * from {}", table), identity, config)?;
        let schema = snapshot.as_table().ok_or_else(|| {
            DatasourceError::stream(format!(
                "schema query on {} returned a {}, expected a table",
                table,
                snapshot.form_name()
            ))
        })?;
        let columns: Vec<String> = schema.columns().map(|(name, _)| name.to_string()).collect();

        let request = SubscribeRequest {
            address: config.url.clone(),
            table_name: table.to_string(),
            action_name: format!("action{}", rand::thread_rng().gen_range(1..=u32::MAX)),
            offset: -1,
            reconnect: true,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = Arc::new(RowHandler { columns, sender });
        self.client
            .subscribe(&request, handler)
            .map_err(DatasourceError::stream)?;
        info!(identity, table, action = %request.action_name, "subscribed to stream");

        Ok(StreamSubscription {
            client: Arc::clone(&self.client),
            request,
            receiver,
            subscribed: true,
        })
    }
}

struct RowHandler {
    columns: Vec<String>,
    sender: mpsc::UnboundedSender<RowEvent>,
}

impl RowHandler {
    fn convert_field(&self, name: &str, message: &dyn StreamMessage) -> Option<TypedColumn> {
        let scalar = match message.value_by_name(name) {
            Some(DataForm::Scalar(scalar)) => scalar,
            Some(other) => {
                warn!(column = name, form = other.form_name(), "stream field is not a scalar");
                return None;
            }
            None => {
                warn!(column = name, "stream row is missing field");
                return None;
            }
        };
        let value = match convert_scalar(scalar) {
            Ok(value) => value,
            Err(e) => {
                warn!(column = name, error = %e, "stream field conversion failed");
                return None;
            }
        };
        let host_type = scalar.data_type.host_type()?;
        let mut values = ColumnValues::with_capacity(host_type, 1);
        values.push(value).ok()?;
        Some(TypedColumn::new(name, values))
    }
}

impl MessageHandler for RowHandler {
    fn do_event(&self, message: &dyn StreamMessage) {
        let event: RowEvent = self
            .columns
            .iter()
            .filter_map(|name| self.convert_field(name, message))
            .collect();
        if self.sender.send(event).is_err() {
            debug!("stream consumer gone, dropping row");
        }
    }
}

/// Live subscription. Unsubscribes exactly once, explicitly or on drop.
pub struct StreamSubscription {
    client: Arc<dyn StreamClient>,
    request: SubscribeRequest,
    receiver: mpsc::UnboundedReceiver<RowEvent>,
    subscribed: bool,
}

impl StreamSubscription {
    pub fn request(&self) -> &SubscribeRequest {
        &self.request
    }

    /// Next row event, or `None` once the client has dropped the handler.
    pub async fn recv(&mut self) -> Option<RowEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered row event without waiting.
    pub fn try_recv(&mut self) -> Option<RowEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(mut self) -> Result<(), DatasourceError> {
        self.release()
    }

    /// Deliver every row as a frame named `frame_name` until `cancel` fires or
    /// the channel closes, then unsubscribe.
    pub async fn forward<F>(
        mut self,
        cancel: CancellationToken,
        frame_name: &str,
        mut sink: F,
    ) -> Result<(), DatasourceError>
    where
        F: FnMut(Frame),
    {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(action = %self.request.action_name, "stream cancelled");
                    break;
                }
                event = self.receiver.recv() => match event {
                    Some(fields) => sink(Frame::with_fields(frame_name, fields)),
                    None => {
                        warn!(action = %self.request.action_name, "stream channel closed");
                        break;
                    }
                },
            }
        }
        self.unsubscribe()
    }

    fn release(&mut self) -> Result<(), DatasourceError> {
        if !self.subscribed {
            return Ok(());
        }
        self.subscribed = false;
        self.client
            .unsubscribe(&self.request)
            .map_err(DatasourceError::stream)?;
        info!(table = %self.request.table_name, action = %self.request.action_name, "unsubscribed from stream");
        Ok(())
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to unsubscribe");
        }
    }
}
