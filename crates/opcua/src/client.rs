//! Real OPC UA binding on top of `async-opcua`.
//!
//! Anonymous identity, security policy None. Each session runs its own
//! event loop task; the session is reported inactive as soon as that task
//! ends or `close()` is called. No internal reconnects: the gateway's
//! connection supervisor owns the retry policy.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use opcua::{
    client::{Client, ClientBuilder, IdentityToken, Session as UaSession},
    crypto::SecurityPolicy,
    types::{
        AttributeId, DataValue, MessageSecurityMode, NodeId, ReadValueId, TimestampsToReturn,
        UserTokenPolicy, Variant, WriteValue,
    },
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{
    error::SessionError,
    node::{Identifier, NodeAddress, NodeHandle, NodeValue},
    session::{next_session_id, Connector, Session},
    settings::ClientSettings,
};

pub struct OpcUaConnector {
    client: Mutex<Client>,
    timeout: Duration,
}

impl OpcUaConnector {
    pub fn new(settings: &ClientSettings) -> Result<Self, SessionError> {
        let client = ClientBuilder::new()
            .application_name(settings.application_name.clone())
            .application_uri(settings.application_uri.clone())
            .product_uri(settings.application_uri.clone())
            .pki_dir(settings.pki_dir.clone())
            .create_sample_keypair(true)
            .trust_server_certs(true)
            .session_retry_limit(0)
            .client()
            .map_err(|errors| SessionError::Connection(errors.join("; ")))?;

        Ok(Self {
            client: Mutex::new(client),
            timeout: settings.request_timeout,
        })
    }
}

#[async_trait]
impl Connector for OpcUaConnector {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn Session>, SessionError> {
        let mut client = self.client.lock().await;
        let connect = client.connect_to_matching_endpoint(
            (
                endpoint,
                SecurityPolicy::None.to_str(),
                MessageSecurityMode::None,
                UserTokenPolicy::anonymous(),
            ),
            IdentityToken::Anonymous,
        );
        let (session, event_loop) = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| SessionError::Timeout(self.timeout))?
            .map_err(|status| SessionError::Connection(status.to_string()))?;
        drop(client);

        let loop_ended = Arc::new(AtomicBool::new(false));
        let event_loop_task = {
            let loop_ended = loop_ended.clone();
            tokio::spawn(async move {
                let status = event_loop.run().await;
                loop_ended.store(true, Ordering::Release);
                debug!("OPC UA session event loop ended: {}", status);
            })
        };

        let connected = tokio::time::timeout(self.timeout, session.wait_for_connection())
            .await
            .unwrap_or(false);
        if !connected {
            event_loop_task.abort();
            return Err(SessionError::Connection(format!(
                "session to {endpoint} could not be activated"
            )));
        }

        let id = next_session_id();
        info!("OPC UA session {} established with {}", id, endpoint);
        Ok(Arc::new(OpcUaSession {
            id,
            session,
            timeout: self.timeout,
            closed: AtomicBool::new(false),
            loop_ended,
            event_loop_task: Mutex::new(Some(event_loop_task)),
        }))
    }
}

pub struct OpcUaSession {
    id: u64,
    session: Arc<UaSession>,
    timeout: Duration,
    closed: AtomicBool,
    loop_ended: Arc<AtomicBool>,
    event_loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl OpcUaSession {
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| SessionError::Timeout(self.timeout))?
    }

    fn ensure_usable(&self, handle: &NodeHandle) -> Result<NodeId, SessionError> {
        if !self.is_active() {
            return Err(SessionError::SessionClosed);
        }
        handle.check_session(self.id)?;
        Ok(node_id(handle.address()))
    }

    async fn read_value(&self, address: &NodeAddress) -> Result<NodeValue, SessionError> {
        let read_error = |reason: String| SessionError::Read {
            address: address.to_string(),
            reason,
        };

        let request = ReadValueId {
            node_id: node_id(address),
            attribute_id: AttributeId::Value as u32,
            ..Default::default()
        };
        let results = self
            .session
            .read(&[request], TimestampsToReturn::Neither, 0.0)
            .await
            .map_err(|status| read_error(status.to_string()))?;
        let data_value = results
            .into_iter()
            .next()
            .ok_or_else(|| read_error("empty read response".into()))?;

        if let Some(status) = data_value.status {
            if !status.is_good() {
                return Err(read_error(status.to_string()));
            }
        }
        let variant = data_value
            .value
            .ok_or_else(|| read_error("no value returned".into()))?;
        from_variant(address, variant)
    }
}

#[async_trait]
impl Session for OpcUaSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.loop_ended.load(Ordering::Acquire)
    }

    async fn resolve(&self, address: &NodeAddress) -> Result<NodeHandle, SessionError> {
        let resolution_error = |reason: String| SessionError::NodeResolution {
            address: address.to_string(),
            reason,
        };
        if !self.is_active() {
            return Err(resolution_error("session is not active".into()));
        }
        self.bounded(self.read_value(address))
            .await
            .map_err(|e| resolution_error(e.to_string()))?;
        Ok(NodeHandle::new(address.clone(), self.id))
    }

    async fn read(&self, handle: &NodeHandle) -> Result<NodeValue, SessionError> {
        self.ensure_usable(handle)?;
        self.bounded(self.read_value(handle.address())).await
    }

    async fn write(&self, handle: &NodeHandle, value: NodeValue) -> Result<(), SessionError> {
        let node_id = self.ensure_usable(handle)?;
        let write_error = |reason: String| SessionError::Write {
            address: handle.address().to_string(),
            reason,
        };

        let request = WriteValue {
            node_id,
            attribute_id: AttributeId::Value as u32,
            value: DataValue::value_only(to_variant(value)),
            ..Default::default()
        };
        let results = self
            .bounded(async {
                self.session
                    .write(&[request])
                    .await
                    .map_err(|status| write_error(status.to_string()))
            })
            .await?;

        match results.first() {
            Some(status) if status.is_good() => Ok(()),
            Some(status) => Err(write_error(status.to_string())),
            None => Err(write_error("empty write response".into())),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.loop_ended.load(Ordering::Acquire) {
            match tokio::time::timeout(self.timeout, self.session.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(status)) => warn!("OPC UA session {} disconnect: {}", self.id, status),
                Err(_) => warn!("OPC UA session {} disconnect timed out", self.id),
            }
        }
        if let Some(task) = self.event_loop_task.lock().await.take() {
            task.abort();
        }
        info!("OPC UA session {} closed", self.id);
    }
}

fn node_id(address: &NodeAddress) -> NodeId {
    match &address.identifier {
        Identifier::Numeric(id) => NodeId::new(address.namespace, *id),
        Identifier::String(id) => NodeId::new(address.namespace, id.clone()),
    }
}

fn to_variant(value: NodeValue) -> Variant {
    match value {
        NodeValue::Boolean(v) => Variant::Boolean(v),
        NodeValue::Int16(v) => Variant::Int16(v),
        NodeValue::Int32(v) => Variant::Int32(v),
        NodeValue::Int64(v) => Variant::Int64(v),
    }
}

fn from_variant(address: &NodeAddress, variant: Variant) -> Result<NodeValue, SessionError> {
    match variant {
        Variant::Boolean(v) => Ok(NodeValue::Boolean(v)),
        Variant::Int16(v) => Ok(NodeValue::Int16(v)),
        Variant::Int32(v) => Ok(NodeValue::Int32(v)),
        Variant::Int64(v) => Ok(NodeValue::Int64(v)),
        other => Err(SessionError::TypeMismatch {
            address: address.to_string(),
            expected: "Boolean or integer",
            actual: format!("{other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion() {
        assert_eq!(node_id(&NodeAddress::numeric(1, 1000)), NodeId::new(1, 1000u32));
        assert_eq!(
            node_id(&NodeAddress::string(2, "Counter")),
            NodeId::new(2, "Counter".to_string())
        );
    }

    #[test]
    fn test_counter_is_written_as_int32() {
        assert_eq!(to_variant(NodeValue::Int32(42)), Variant::Int32(42));
    }

    #[test]
    fn test_unsupported_variant_is_type_mismatch() {
        let addr = NodeAddress::numeric(1, 1000);
        assert!(matches!(
            from_variant(&addr, Variant::Double(1.5)),
            Err(SessionError::TypeMismatch { .. })
        ));
        assert_eq!(
            from_variant(&addr, Variant::Int16(7)).unwrap(),
            NodeValue::Int16(7)
        );
    }
}
