//! In-process object cache.
//!
//! Stores both kinds in memory, stamps every write with a fresh resource
//! version and fans notifications out to registered handlers. Used by tests,
//! benchmarks and embedders that already hold the authoritative state.
//!
//! Writes are serialized, so notifications for a key are delivered in write
//! order. Handlers must not write back into the cache from a callback.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{LookupError, ObjectCache, ResourceEventHandler};
use crate::models::{AttachmentRecord, Resource, ResourceKind, TargetRecord};

#[derive(Default)]
pub struct MemoryObjectCache {
    attachments: RwLock<HashMap<String, Arc<AttachmentRecord>>>,
    targets: RwLock<HashMap<String, Arc<TargetRecord>>>,
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler>>>,
    synced: RwLock<HashSet<ResourceKind>>,
    /// Injected read failures, keyed by kind and name
    unavailable: RwLock<HashMap<(ResourceKind, String), String>>,
    next_version: AtomicU64,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for MemoryObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectCache")
            .field("attachments", &self.attachments.read().len())
            .field("targets", &self.targets.read().len())
            .field("handlers", &self.handlers.read().len())
            .field("synced", &*self.synced.read())
            .finish()
    }
}

impl MemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_resource_version(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn handlers(&self) -> Vec<Arc<dyn ResourceEventHandler>> {
        self.handlers.read().clone()
    }

    fn notify_upsert(&self, old: Option<Resource>, new: Resource) {
        for handler in self.handlers() {
            match &old {
                Some(old) => handler.on_update(old.clone(), new.clone()),
                None => handler.on_add(new.clone()),
            }
        }
    }

    fn notify_delete(&self, resource: Resource) {
        for handler in self.handlers() {
            handler.on_delete(resource.clone());
        }
    }

    /// Insert or replace an attachment, assigning it a new resource version
    pub fn upsert_attachment(&self, mut record: AttachmentRecord) -> Arc<AttachmentRecord> {
        let _write = self.write_lock.lock();
        record.resource_version = self.next_resource_version();
        let record = Arc::new(record);
        let old = self
            .attachments
            .write()
            .insert(record.name.clone(), Arc::clone(&record));
        trace!(name = %record.name, version = %record.resource_version, "Attachment stored");
        self.notify_upsert(
            old.map(Resource::Attachment),
            Resource::Attachment(Arc::clone(&record)),
        );
        record
    }

    /// Insert or replace a target, assigning it a new resource version
    pub fn upsert_target(&self, mut record: TargetRecord) -> Arc<TargetRecord> {
        let _write = self.write_lock.lock();
        record.resource_version = self.next_resource_version();
        let record = Arc::new(record);
        let old = self
            .targets
            .write()
            .insert(record.name.clone(), Arc::clone(&record));
        trace!(name = %record.name, version = %record.resource_version, "Target stored");
        self.notify_upsert(old.map(Resource::Target), Resource::Target(Arc::clone(&record)));
        record
    }

    pub fn delete_attachment(&self, name: &str) -> Option<Arc<AttachmentRecord>> {
        let _write = self.write_lock.lock();
        let removed = self.attachments.write().remove(name);
        if let Some(record) = &removed {
            self.notify_delete(Resource::Attachment(Arc::clone(record)));
        }
        removed
    }

    pub fn delete_target(&self, name: &str) -> Option<Arc<TargetRecord>> {
        let _write = self.write_lock.lock();
        let removed = self.targets.write().remove(name);
        if let Some(record) = &removed {
            self.notify_delete(Resource::Target(Arc::clone(record)));
        }
        removed
    }

    /// Redeliver every stored record as an update with identical old and new
    pub fn resync(&self) {
        let _write = self.write_lock.lock();
        let attachments: Vec<_> = self.attachments.read().values().cloned().collect();
        let targets: Vec<_> = self.targets.read().values().cloned().collect();
        debug!(
            attachments = attachments.len(),
            targets = targets.len(),
            "Resyncing object cache"
        );

        for record in attachments {
            let resource = Resource::Attachment(record);
            for handler in self.handlers() {
                handler.on_update(resource.clone(), resource.clone());
            }
        }
        for record in targets {
            let resource = Resource::Target(record);
            for handler in self.handlers() {
                handler.on_update(resource.clone(), resource.clone());
            }
        }
    }

    pub fn mark_synced(&self, kind: ResourceKind) {
        self.synced.write().insert(kind);
    }

    /// Make reads of one record fail with a transient error until cleared
    pub fn set_unavailable(&self, kind: ResourceKind, name: &str, reason: Option<&str>) {
        let mut unavailable = self.unavailable.write();
        match reason {
            Some(reason) => {
                unavailable.insert((kind, name.to_string()), reason.to_string());
            }
            None => {
                unavailable.remove(&(kind, name.to_string()));
            }
        }
    }

    fn check_available(&self, kind: ResourceKind, name: &str) -> Result<(), LookupError> {
        match self.unavailable.read().get(&(kind, name.to_string())) {
            Some(reason) => Err(LookupError::unavailable(kind, name, reason.clone())),
            None => Ok(()),
        }
    }
}

impl ObjectCache for MemoryObjectCache {
    fn get_attachment(&self, name: &str) -> Result<Arc<AttachmentRecord>, LookupError> {
        self.check_available(ResourceKind::Attachment, name)?;
        self.attachments
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::not_found(ResourceKind::Attachment, name))
    }

    fn get_target(&self, name: &str) -> Result<Arc<TargetRecord>, LookupError> {
        self.check_available(ResourceKind::Target, name)?;
        self.targets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::not_found(ResourceKind::Target, name))
    }

    fn has_synced(&self, kind: ResourceKind) -> bool {
        self.synced.read().contains(&kind)
    }

    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        self.handlers.write().push(handler);
    }
}
