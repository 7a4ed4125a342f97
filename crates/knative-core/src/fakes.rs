//! In-memory transport for tests and local wiring.
//!
//! Listeners are keyed by `(host, port, path)`. A consumer whose physical URI
//! carries a `filter.<header>=<value>` parameter only receives messages whose
//! header matches, so several logical consumers can share one listener.
//! Stopping an endpoint unregisters every consumer it handed out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use knative_env::PhysicalUri;
use tracing::debug;

use crate::error::{KnativeError, KnativeResult};
use crate::message::Message;
use crate::processor::Processor;
use crate::transport::{Consumer, PhysicalEndpoint, Transport};

type ListenerKey = (String, u16, String);
type Registrations = Arc<Mutex<Vec<u64>>>;

struct Registration {
    id: u64,
    filter: Option<(String, String)>,
    processor: Arc<dyn Processor>,
}

impl Registration {
    fn accepts(&self, message: &Message) -> bool {
        match &self.filter {
            Some((name, value)) => message.header(name) == Some(value.as_str()),
            None => true,
        }
    }
}

#[derive(Default)]
struct Hub {
    listeners: Mutex<HashMap<ListenerKey, Vec<Registration>>>,
    next_id: AtomicU64,
    started: AtomicUsize,
}

impl Hub {
    fn register(
        &self,
        key: ListenerKey,
        filter: Option<(String, String)>,
        processor: Arc<dyn Processor>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.entry(key).or_default().push(Registration {
            id,
            filter,
            processor,
        });
        id
    }

    fn unregister(&self, key: &ListenerKey, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(regs) = listeners.get_mut(key) {
            regs.retain(|r| r.id != id);
            if regs.is_empty() {
                listeners.remove(key);
            }
        }
    }

    fn route(&self, key: &ListenerKey, message: &Message) -> Option<Arc<dyn Processor>> {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .get(key)?
            .iter()
            .find(|r| r.accepts(message))
            .map(|r| Arc::clone(&r.processor))
    }

    fn consumers(&self, key: &ListenerKey) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(key).map_or(0, Vec::len)
    }
}

/// Shared in-process transport. Clones share the same listeners.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    hub: Arc<Hub>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of started consumers listening on `uri`'s `(host, port, path)`.
    pub fn consumer_count(&self, uri: &PhysicalUri) -> usize {
        self.hub.consumers(&uri.listener_key())
    }

    /// Number of physical endpoints currently started.
    pub fn started_endpoints(&self) -> usize {
        self.hub.started.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn endpoint(&self, uri: &PhysicalUri) -> KnativeResult<Arc<dyn PhysicalEndpoint>> {
        Ok(Arc::new(MemoryEndpoint {
            hub: Arc::clone(&self.hub),
            uri: uri.clone(),
            started: Arc::new(AtomicBool::new(false)),
            registrations: Registrations::default(),
        }))
    }
}

struct MemoryEndpoint {
    hub: Arc<Hub>,
    uri: PhysicalUri,
    started: Arc<AtomicBool>,
    registrations: Registrations,
}

#[async_trait]
impl PhysicalEndpoint for MemoryEndpoint {
    fn uri(&self) -> &PhysicalUri {
        &self.uri
    }

    async fn start(&self) -> KnativeResult<()> {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.hub.started.fetch_add(1, Ordering::SeqCst);
            debug!(physical = %self.uri, "memory endpoint started");
        }
        Ok(())
    }

    async fn stop(&self) -> KnativeResult<()> {
        let released: Vec<u64> = {
            let mut registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
            registrations.drain(..).collect()
        };
        let key = self.uri.listener_key();
        for id in &released {
            self.hub.unregister(&key, *id);
        }
        if self.started.swap(false, Ordering::SeqCst) {
            self.hub.started.fetch_sub(1, Ordering::SeqCst);
            debug!(physical = %self.uri, consumers = released.len(), "memory endpoint stopped");
        }
        Ok(())
    }

    fn create_producer(&self) -> KnativeResult<Arc<dyn Processor>> {
        Ok(Arc::new(MemoryProducer {
            hub: Arc::clone(&self.hub),
            uri: self.uri.clone(),
            started: Arc::clone(&self.started),
        }))
    }

    fn create_consumer(&self, processor: Arc<dyn Processor>) -> KnativeResult<Box<dyn Consumer>> {
        Ok(Box::new(MemoryConsumer {
            hub: Arc::clone(&self.hub),
            key: self.uri.listener_key(),
            filter: self
                .uri
                .filter()
                .map(|(n, v)| (n.to_string(), v.to_string())),
            processor,
            started: Arc::clone(&self.started),
            registrations: Arc::clone(&self.registrations),
            registration: Mutex::new(None),
        }))
    }
}

struct MemoryProducer {
    hub: Arc<Hub>,
    uri: PhysicalUri,
    started: Arc<AtomicBool>,
}

#[async_trait]
impl Processor for MemoryProducer {
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(KnativeError::Transport(format!(
                "endpoint {} is not started",
                self.uri
            )));
        }
        let target = self
            .hub
            .route(&self.uri.listener_key(), &message)
            .ok_or_else(|| {
                KnativeError::Transport(format!("no consumer accepts the message at {}", self.uri))
            })?;
        target.process(message).await
    }
}

struct MemoryConsumer {
    hub: Arc<Hub>,
    key: ListenerKey,
    filter: Option<(String, String)>,
    processor: Arc<dyn Processor>,
    started: Arc<AtomicBool>,
    registrations: Registrations,
    registration: Mutex<Option<u64>>,
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn start(&self) -> KnativeResult<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(KnativeError::Transport(format!(
                "endpoint {}:{}{} is not started",
                self.key.0, self.key.1, self.key.2
            )));
        }
        let mut registration = self.registration.lock().unwrap_or_else(|e| e.into_inner());
        let mut registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        // A stop of the owning endpoint drops the id from the shared list.
        let live = registration.is_some_and(|id| registrations.contains(&id));
        if !live {
            let id = self
                .hub
                .register(self.key.clone(), self.filter.clone(), Arc::clone(&self.processor));
            registrations.push(id);
            *registration = Some(id);
        }
        Ok(())
    }

    async fn stop(&self) -> KnativeResult<()> {
        let mut registration = self.registration.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = registration.take() {
            let mut registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
            registrations.retain(|r| *r != id);
            self.hub.unregister(&self.key, id);
        }
        Ok(())
    }
}
