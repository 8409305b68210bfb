use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::constants::Command;

/// One live connection as SHOW PROCESSLIST sees it.
#[derive(Clone)]
pub struct ProcessEntry {
    pub thread_id: u32,
    pub username: Option<String>,
    pub host: String,
    pub schema: Option<String>,
    pub command: u8,
    pub since: Instant,
}

lazy_static! {
    // Keyed by the client's ephemeral port: unique per live connection
    // and already known on both insert and delete paths.
    static ref CONNECTIONS: Mutex<HashMap<u16, ProcessEntry>> = Mutex::new(HashMap::new());
}

/// Holds one slot of the connections table for exactly the lifetime of
/// a handler. Dropping it releases the slot on every exit path.
pub struct ProcessSlot {
    port: u16,
}

impl ProcessSlot {
    pub fn register(port: u16, thread_id: u32, host: String) -> Self {
        let entry = ProcessEntry {
            thread_id,
            username: None,
            host,
            schema: None,
            command: Command::Connect as u8,
            since: Instant::now(),
        };
        CONNECTIONS.lock().unwrap().insert(port, entry);
        ProcessSlot { port }
    }

    pub fn set_username(&self, username: &str) {
        if let Some(entry) = CONNECTIONS.lock().unwrap().get_mut(&self.port) {
            entry.username = Some(username.to_string());
        }
    }

    pub fn set_schema(&self, schema: &str) {
        if let Some(entry) = CONNECTIONS.lock().unwrap().get_mut(&self.port) {
            entry.schema = Some(schema.to_string());
        }
    }

    /// Record a command transition and restart its clock.
    pub fn touch(&self, command: u8) {
        if let Some(entry) = CONNECTIONS.lock().unwrap().get_mut(&self.port) {
            entry.command = command;
            entry.since = Instant::now();
        }
    }
}

impl Drop for ProcessSlot {
    fn drop(&mut self) {
        CONNECTIONS.lock().unwrap().remove(&self.port);
    }
}

/// A point-in-time copy of the table, for SHOW PROCESSLIST.
pub fn snapshot() -> Vec<ProcessEntry> {
    CONNECTIONS.lock().unwrap().values().cloned().collect()
}
