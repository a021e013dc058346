//! In-memory stand-ins for the broker and the automation server.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use opcgate_opcua::{
    next_session_id, Connector, NodeAddress, NodeHandle, NodeValue, Session, SessionError,
};
use tokio::time::Instant;

use super::{context::BoundNodes, error::GatewayError, publisher::Publisher};
use crate::config::opcua::OpcUaConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub at: Instant,
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
    closes: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    /// `(topic, payload)` pairs in publish order.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.published()
            .into_iter()
            .map(|p| (p.topic, p.payload))
            .collect()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload)
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), GatewayError> {
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            payload,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub address: NodeAddress,
    pub value: NodeValue,
    pub session_id: u64,
}

/// Shared state of the fake automation server.
pub struct FakeServer {
    values: Mutex<HashMap<NodeAddress, NodeValue>>,
    /// Flag values handed out by successive reads before falling back to `values`.
    flag_script: Mutex<VecDeque<bool>>,
    missing: Mutex<HashSet<NodeAddress>>,
    writes: Mutex<Vec<RecordedWrite>>,
    resolutions: Mutex<Vec<(NodeAddress, u64)>>,
    connects: Mutex<Vec<Instant>>,
    failing_connects: AtomicUsize,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    flag: NodeAddress,
    counter: NodeAddress,
}

impl FakeServer {
    /// A server exposing the default flag (false) and counter (0) nodes.
    pub fn new() -> Arc<Self> {
        let config = OpcUaConfig::default();
        let mut values = HashMap::new();
        values.insert(config.flag_node.clone(), NodeValue::Boolean(false));
        values.insert(config.counter_node.clone(), NodeValue::Int16(0));
        Arc::new(Self {
            values: Mutex::new(values),
            flag_script: Mutex::new(VecDeque::new()),
            missing: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
            resolutions: Mutex::new(Vec::new()),
            connects: Mutex::new(Vec::new()),
            failing_connects: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            flag: config.flag_node,
            counter: config.counter_node,
        })
    }

    pub fn connector(self: &Arc<Self>) -> Arc<FakeConnector> {
        Arc::new(FakeConnector {
            server: self.clone(),
        })
    }

    pub fn flag_address(&self) -> &NodeAddress {
        &self.flag
    }

    pub fn counter_address(&self) -> &NodeAddress {
        &self.counter
    }

    pub fn set_flag(&self, value: bool) {
        self.set_value(&self.flag, NodeValue::Boolean(value));
    }

    pub fn set_counter(&self, value: i16) {
        self.set_value(&self.counter, NodeValue::Int16(value));
    }

    pub fn set_value(&self, address: &NodeAddress, value: NodeValue) {
        self.values.lock().unwrap().insert(address.clone(), value);
    }

    pub fn script_flag(&self, values: impl IntoIterator<Item = bool>) {
        self.flag_script.lock().unwrap().extend(values);
    }

    pub fn remove_node(&self, address: &NodeAddress) {
        self.missing.lock().unwrap().insert(address.clone());
    }

    pub fn restore_node(&self, address: &NodeAddress) {
        self.missing.lock().unwrap().remove(address);
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Simulates the server going away: every open session becomes inactive.
    pub fn drop_sessions(&self) {
        for session in self.sessions.lock().unwrap().iter() {
            session.active.store(false, Ordering::SeqCst);
        }
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn resolutions(&self) -> Vec<(NodeAddress, u64)> {
        self.resolutions.lock().unwrap().clone()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().unwrap().clone()
    }

    /// Number of sessions currently open (active and not closed).
    pub fn open_sessions(&self) -> usize {
        self.sessions()
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    /// Connects and resolves both nodes, bypassing the gateway.
    pub async fn bound_nodes(self: &Arc<Self>) -> BoundNodes {
        let session = self.connector().connect("opc.tcp://fake:4840").await.unwrap();
        let flag = session.resolve(&self.flag).await.unwrap();
        let counter = session.resolve(&self.counter).await.unwrap();
        BoundNodes {
            session,
            flag,
            counter,
        }
    }

    fn read_value(&self, address: &NodeAddress) -> Option<NodeValue> {
        if *address == self.flag {
            if let Some(next) = self.flag_script.lock().unwrap().pop_front() {
                return Some(NodeValue::Boolean(next));
            }
        }
        self.values.lock().unwrap().get(address).copied()
    }

    fn exists(&self, address: &NodeAddress) -> bool {
        !self.missing.lock().unwrap().contains(address)
            && self.values.lock().unwrap().contains_key(address)
    }
}

pub struct FakeConnector {
    server: Arc<FakeServer>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn Session>, SessionError> {
        self.server.connects.lock().unwrap().push(Instant::now());

        let failing = self.server.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.server
                .failing_connects
                .store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::Connection(format!(
                "connection refused by {endpoint}"
            )));
        }

        let session = Arc::new(FakeSession {
            id: next_session_id(),
            server: self.server.clone(),
            active: AtomicBool::new(true),
            closes: AtomicUsize::new(0),
        });
        self.server.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

pub struct FakeSession {
    id: u64,
    server: Arc<FakeServer>,
    active: AtomicBool,
    closes: AtomicUsize,
}

impl FakeSession {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn check(&self, handle: &NodeHandle) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::SessionClosed);
        }
        handle.check_session(self.id)
    }
}

#[async_trait]
impl Session for FakeSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn resolve(&self, address: &NodeAddress) -> Result<NodeHandle, SessionError> {
        self.server
            .resolutions
            .lock()
            .unwrap()
            .push((address.clone(), self.id));
        if !self.is_active() || !self.server.exists(address) {
            return Err(SessionError::NodeResolution {
                address: address.to_string(),
                reason: "BadNodeIdUnknown".into(),
            });
        }
        Ok(NodeHandle::new(address.clone(), self.id))
    }

    async fn read(&self, handle: &NodeHandle) -> Result<NodeValue, SessionError> {
        self.check(handle)?;
        self.server
            .read_value(handle.address())
            .ok_or_else(|| SessionError::Read {
                address: handle.address().to_string(),
                reason: "BadNodeIdUnknown".into(),
            })
    }

    async fn write(&self, handle: &NodeHandle, value: NodeValue) -> Result<(), SessionError> {
        self.check(handle)?;
        self.server.writes.lock().unwrap().push(RecordedWrite {
            address: handle.address().clone(),
            value,
            session_id: self.id,
        });
        self.server.set_value(handle.address(), value);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }
}
