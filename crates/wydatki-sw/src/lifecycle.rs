//! Worker lifecycle state machine and the client registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::message::ControllerEvent;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WorkerState {
    /// Initial state, script registered but not yet installing.
    #[default]
    Parsed,
    /// Installing (pre-caching the manifest).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (evicting stale stores).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced or install failed).
    Redundant,
}

/// A worker instance.
#[derive(Debug, Clone)]
pub struct Worker {
    /// Unique ID.
    pub id: WorkerId,

    /// Script URL.
    pub script_url: Url,

    /// Current state.
    pub state: WorkerState,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl Worker {
    /// Create a new worker.
    pub fn new(script_url: Url) -> Self {
        Self {
            id: WorkerId::new(),
            script_url,
            state: WorkerState::Parsed,
            state_changed_at: Instant::now(),
        }
    }

    /// Set state.
    pub fn set_state(&mut self, state: WorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Activated
    }

    /// Check if redundant.
    pub fn is_redundant(&self) -> bool {
        self.state == WorkerState::Redundant
    }
}

/// Tracks the installing/waiting/active worker generations for a scope.
#[derive(Debug)]
pub struct Registration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<Worker>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<Worker>,

    /// Active worker.
    pub active: Option<Worker>,
}

impl Registration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    /// Begin installing a new worker generation.
    pub fn begin_install(&mut self, script_url: Url) -> WorkerId {
        let mut worker = Worker::new(script_url);
        worker.set_state(WorkerState::Installing);
        let id = worker.id;
        self.installing = Some(worker);
        id
    }

    /// Transition installing to waiting.
    pub fn install_complete(&mut self) {
        if let Some(mut worker) = self.installing.take() {
            worker.set_state(WorkerState::Installed);
            self.waiting = Some(worker);
        }
    }

    /// Activate the waiting worker, retiring the previous active one.
    pub fn activate(&mut self) {
        if let Some(mut worker) = self.waiting.take() {
            worker.set_state(WorkerState::Activating);

            if let Some(mut old) = self.active.take() {
                old.set_state(WorkerState::Redundant);
            }

            worker.set_state(WorkerState::Activated);
            self.active = Some(worker);
        }
    }

    /// Skip waiting (force activate).
    pub fn skip_waiting(&mut self) {
        self.activate();
    }

    /// Get the active worker.
    pub fn get_active(&self) -> Option<&Worker> {
        self.active.as_ref()
    }
}

/// A page controlled by (or connectable to) the worker.
#[derive(Debug)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Whether this client is controlled by the active worker.
    pub controlled: bool,

    /// Channel the controller pushes events over.
    sender: mpsc::UnboundedSender<ControllerEvent>,
}

impl Client {
    /// Push an event to this client. Disconnected clients are ignored.
    pub fn post_event(&self, event: ControllerEvent) {
        let _ = self.sender.send(event);
    }
}

/// The set of connected clients.
#[derive(Debug, Default)]
pub struct Clients {
    clients: hashbrown::HashMap<String, Client>,
}

impl Clients {
    /// Create a new client registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a page. Returns its ID and the event receiver.
    pub fn connect(&mut self, url: Url) -> (String, mpsc::UnboundedReceiver<ControllerEvent>) {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed));

        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.insert(
            id.clone(),
            Client {
                id: id.clone(),
                url,
                controlled: false,
                sender,
            },
        );
        debug!(client = %id, "Client connected");
        (id, receiver)
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Take control of all connected clients immediately.
    pub fn claim(&mut self) {
        for client in self.clients.values_mut() {
            client.controlled = true;
        }
    }

    /// Push an event to every connected client.
    pub fn broadcast(&self, event: &ControllerEvent) {
        for client in self.clients.values() {
            client.post_event(event.clone());
        }
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no clients are connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
