//! Handle-based table of connections for embedders that address
//! connections by opaque integers (binding layers, event loops).

use std::collections::HashMap;

use tracing::debug;

use crate::callbacks::ParserCallbacks;
use crate::config::ParserConfig;
use crate::connection::{Connection, ConnectionId, Direction, ProtocolVersion, Role};
use crate::error::{ParserError, Result};

/// Opaque reference to a registry slot. Stale once the connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    index: u32,
    generation: u32,
}

impl ConnectionHandle {
    /// Pack into a single integer; `0` is never a valid handle.
    pub fn into_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

fn unknown_handle(handle: ConnectionHandle) -> ParserError {
    ParserError::NullPointer(format!("unknown connection handle {}", handle.into_raw()))
}

struct Slot<C: ParserCallbacks> {
    generation: u32,
    connection: Option<Connection<C>>,
}

pub struct ConnectionRegistry<C: ParserCallbacks> {
    slots: Vec<Slot<C>>,
    free: Vec<u32>,
    by_id: HashMap<ConnectionId, ConnectionHandle>,
    config: ParserConfig,
}

impl<C: ParserCallbacks> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ParserCallbacks> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Every connection opened through this registry uses `config`.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: HashMap::new(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Handle of the live connection opened with `id`.
    pub fn find(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn open(
        &mut self,
        id: ConnectionId,
        version: ProtocolVersion,
        role: Role,
        callbacks: C,
    ) -> Result<ConnectionHandle> {
        if self.by_id.contains_key(&id) {
            return Err(ParserError::AlreadyConnected(id.0));
        }
        let connection = Connection::with_config(id, version, role, callbacks, self.config.clone());
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.connection = Some(connection);
                ConnectionHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| ParserError::invalid_state("connection table is full"))?;
                self.slots.push(Slot {
                    generation: 1,
                    connection: Some(connection),
                });
                ConnectionHandle { index, generation: 1 }
            }
        };
        self.by_id.insert(id, handle);
        Ok(handle)
    }

    fn slot_mut(&mut self, handle: ConnectionHandle) -> Result<&mut Slot<C>> {
        if handle.generation == 0 {
            return Err(ParserError::NullPointer("null connection handle".into()));
        }
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or_else(|| unknown_handle(handle))?;
        if slot.generation != handle.generation || slot.connection.is_none() {
            return Err(ParserError::invalid_state("connection handle is stale"));
        }
        Ok(slot)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Result<&Connection<C>> {
        if handle.generation == 0 {
            return Err(ParserError::NullPointer("null connection handle".into()));
        }
        let slot = self
            .slots
            .get(handle.index as usize)
            .ok_or_else(|| unknown_handle(handle))?;
        match &slot.connection {
            Some(connection) if slot.generation == handle.generation => Ok(connection),
            _ => Err(ParserError::invalid_state("connection handle is stale")),
        }
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Result<&mut Connection<C>> {
        let slot = self.slot_mut(handle)?;
        slot.connection
            .as_mut()
            .ok_or_else(|| ParserError::invalid_state("connection handle is stale"))
    }

    pub fn input(
        &mut self,
        handle: ConnectionHandle,
        direction: Direction,
        data: &[u8],
    ) -> Result<()> {
        self.get_mut(handle)?.input(direction, data)
    }

    pub fn disconnect(&mut self, handle: ConnectionHandle, direction: Direction) -> Result<()> {
        self.get_mut(handle)?.disconnect(direction)
    }

    /// Close the connection and free its slot; the handle becomes stale.
    pub fn close(&mut self, handle: ConnectionHandle) -> Result<C> {
        let slot = self.slot_mut(handle)?;
        let mut connection = slot
            .connection
            .take()
            .ok_or_else(|| ParserError::invalid_state("connection handle is stale"))?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.free.push(handle.index);
        self.by_id.remove(&connection.id());
        debug!(id = %connection.id(), "released registry slot");
        connection.close()
    }
}
