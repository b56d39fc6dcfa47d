//! Definition registry: one host definition per distinct record layout.
//!
//! Registering a layout issues one "add to data definition" call per field,
//! in field order, and caches the resulting [`DefinitionId`]. Later
//! registrations of an equal layout return the cached id without touching the
//! host. Concurrent first registrations of the same layout share a single
//! attempt: the first caller performs it and the others wait for its result.
//! A failed attempt is not cached, so a later call may retry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::correlator::SendHistory;
use crate::transport::{HostCall, Transport};
use crate::types::{DefinitionId, RecordLayout, SendOrigin};
use crate::{Result, SimError};

/// A layout registered with the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub definition: DefinitionId,
    pub layout: Arc<RecordLayout>,
}

type Slot = Arc<OnceCell<Registration>>;

/// Cache of registered layouts for one connection.
pub struct Registry {
    next_id: AtomicU32,
    slots: Mutex<HashMap<RecordLayout, Slot>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { next_id: AtomicU32::new(1), slots: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RecordLayout, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the definition for `layout`, registering it on first sight.
    pub async fn get_or_register(
        &self,
        layout: RecordLayout,
        transport: &dyn Transport,
        history: &SendHistory,
    ) -> Result<Registration> {
        let slot = {
            let mut slots = self.lock();
            Arc::clone(slots.entry(layout.clone()).or_default())
        };

        let registration = slot
            .get_or_try_init(|| async move { self.register(layout, transport, history) })
            .await?;
        Ok(registration.clone())
    }

    fn register(
        &self,
        layout: RecordLayout,
        transport: &dyn Transport,
        history: &SendHistory,
    ) -> Result<Registration> {
        let definition = DefinitionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(definition = %definition, fields = layout.field_count(), "Registering data definition");

        for field in &layout.fields {
            let call = HostCall::AddToDataDefinition {
                definition,
                variable: field.variable.clone(),
                unit: field.unit.clone(),
                kind: field.kind,
            };

            match transport.call(call) {
                Ok(send_id) => history.record(
                    send_id,
                    SendOrigin::DefinitionField { definition, variable: field.variable.clone() },
                ),
                Err(source) => {
                    // drop the partial definition so the id is never half-defined on the host
                    if let Err(e) = transport.call(HostCall::ClearDataDefinition { definition }) {
                        warn!(definition = %definition, error = %e, "Failed to clear partial definition");
                    }
                    return Err(SimError::RegistrationFailed {
                        definition,
                        variable: field.variable.clone(),
                        source: Box::new(source),
                    });
                }
            }
        }

        info!(definition = %definition, size = layout.size, "Registered data definition");
        Ok(Registration { definition, layout: Arc::new(layout) })
    }

    /// Forget a definition so the next registration of its layout starts over.
    ///
    /// Used when the host rejects one of the definition's fields after the
    /// calls were accepted locally.
    pub fn invalidate(&self, definition: DefinitionId) -> bool {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.get().is_none_or(|reg| reg.definition != definition));
        let removed = slots.len() != before;
        if removed {
            debug!(definition = %definition, "Invalidated data definition");
        }
        removed
    }

    /// Layout of a registered definition.
    pub fn layout(&self, definition: DefinitionId) -> Option<Arc<RecordLayout>> {
        self.lock()
            .values()
            .filter_map(|slot| slot.get())
            .find(|reg| reg.definition == definition)
            .map(|reg| Arc::clone(&reg.layout))
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
