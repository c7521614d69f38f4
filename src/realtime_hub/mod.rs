//! ConnectionRegistry - WebSocket client tracking and fan-out
//!
//! ## Responsibilities
//!
//! - Register/unregister WebSocket clients
//! - Broadcast hub messages to every connected client
//! - Track whether any client connects from a remote address
//! - Fire the disconnect hook when the last client leaves
//!
//! Clients that fall behind simply drop messages; a dead sender is
//! cleaned up on the next unregister.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{
    CaptureResult, CompareResult, ControlResult, DeviceStatus, FingerTypeResult,
    MultiTemplateResult, PreviewFrame, SplitResult, TemplateResult,
};

/// Message envelope pushed to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubMessage {
    Connection {
        client_id: String,
        message: String,
        connected_at: DateTime<Utc>,
    },
    Status(DeviceStatus),
    Preview(PreviewFrame),
    PreviewStarted {
        active: bool,
    },
    PreviewStopped {
        active: bool,
    },
    CaptureResult(CaptureResult),
    SplitResult(SplitResult),
    TemplateResult(TemplateResult),
    MultiTemplateResult(MultiTemplateResult),
    RollResult(CaptureResult),
    FingerTypeResult(FingerTypeResult),
    CompareResult(CompareResult),
    ControlResult {
        command: String,
        result: ControlResult,
    },
    Error {
        code: String,
        message: String,
    },
}

/// One registered WebSocket client.
pub struct ClientConnection {
    pub id: Uuid,
    pub tx: mpsc::UnboundedSender<String>,
    pub remote: bool,
    pub connected_at: DateTime<Utc>,
}

type DisconnectHook = Box<dyn Fn() + Send + Sync>;

/// Registry of live WebSocket clients.
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<Uuid, ClientConnection>>,
    client_count: AtomicU64,
    on_last_disconnect: RwLock<Option<DisconnectHook>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            client_count: AtomicU64::new(0),
            on_last_disconnect: RwLock::new(None),
        }
    }

    /// Hook fired when the last client unregisters. Set once at startup.
    pub fn set_last_disconnect_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_last_disconnect.write().unwrap() = Some(Box::new(hook));
    }

    /// Register a new client; returns its id and the message receiver.
    pub fn register(&self, remote: bool) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ClientConnection {
            id,
            tx,
            remote,
            connected_at: Utc::now(),
        };
        self.clients.write().unwrap().insert(id, connection);
        let count = self.client_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(client_id = %id, remote = remote, clients = count, "websocket client registered");
        (id, rx)
    }

    pub fn unregister(&self, id: Uuid) {
        let removed = self.clients.write().unwrap().remove(&id).is_some();
        if !removed {
            return;
        }
        let remaining = self.client_count.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::info!(client_id = %id, clients = remaining, "websocket client unregistered");
        if remaining == 0 {
            if let Some(hook) = self.on_last_disconnect.read().unwrap().as_ref() {
                hook();
            }
        }
    }

    /// Registration time of a live client.
    pub fn connected_at(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.clients.read().unwrap().get(&id).map(|c| c.connected_at)
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::SeqCst)
    }

    /// True when at least one client connects from a non-loopback address.
    pub fn has_remote_clients(&self) -> bool {
        self.clients.read().unwrap().values().any(|c| c.remote)
    }

    /// Send one message to one client.
    pub fn send_to(&self, id: Uuid, message: &HubMessage) -> bool {
        let payload = match serde_json::to_string(message) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize hub message");
                return false;
            }
        };
        let clients = self.clients.read().unwrap();
        match clients.get(&id) {
            Some(client) => client.tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Broadcast to all clients. Returns the number of deliveries.
    pub fn broadcast(&self, message: &HubMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize hub message");
                return 0;
            }
        };
        let clients = self.clients.read().unwrap();
        clients
            .values()
            .filter(|c| c.tx.send(payload.clone()).is_ok())
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an address should be treated as a remote client.
pub fn is_remote_addr(ip: IpAddr) -> bool {
    !ip.is_loopback()
}
