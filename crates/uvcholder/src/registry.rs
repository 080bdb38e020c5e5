// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    config::HolderConfig,
    driver::{DeviceDriver, DeviceInfo, DeviceState, OnDeviceEvent},
    host::{DeviceEvent, HostNotifier},
    holder::StreamHolder,
    DeviceId, Error,
};
use log::{debug, info, warn};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};

/// All stream holders of the process, keyed by device id.
///
/// Attach events create a holder, detach events tear it down. Lookups made
/// on behalf of the host use a non-blocking lock and report
/// [`Error::Unavailable`] while another thread is mutating the map, so
/// host calls never wait on a hot-plug in progress.
pub struct DeviceRegistry {
    driver: Arc<dyn DeviceDriver>,
    config: HolderConfig,
    holders: Mutex<HashMap<DeviceId, Arc<StreamHolder>>>,
    notifier: Option<Box<dyn HostNotifier>>,
}

impl DeviceRegistry {
    pub fn new(driver: Arc<dyn DeviceDriver>, config: HolderConfig) -> Self {
        DeviceRegistry {
            driver,
            config,
            holders: Mutex::new(HashMap::new()),
            notifier: None,
        }
    }

    /// Forward attach and detach events to the host once the registry has
    /// processed them.
    pub fn with_notifier(mut self, notifier: impl HostNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    fn holders(&self) -> MutexGuard<'_, HashMap<DeviceId, Arc<StreamHolder>>> {
        self.holders.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_holders(
        &self,
        id: DeviceId,
    ) -> Result<MutexGuard<'_, HashMap<DeviceId, Arc<StreamHolder>>>, Error> {
        match self.holders.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
            Err(TryLockError::WouldBlock) => Err(Error::Unavailable(id)),
        }
    }

    fn notify(&self, device_id: DeviceId, attached: bool) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(DeviceEvent {
                device_id,
                attached,
            });
        }
    }

    /// Create the holder for a newly attached device, unless one exists,
    /// then notify the host.
    pub fn on_attach(&self, id: DeviceId) {
        let (_, created) = self.entry(id);
        if created {
            info!("device {} attached", id);
        } else {
            debug!("DeviceRegistry::on_attach() - device {} already held", id);
        }
        self.notify(id, true);
    }

    /// Holder of `id`, opening one first if the device has none. Waits for
    /// the registry lock.
    pub fn get_or_create(&self, id: DeviceId) -> Arc<StreamHolder> {
        self.entry(id).0
    }

    fn entry(&self, id: DeviceId) -> (Arc<StreamHolder>, bool) {
        let mut holders = self.holders();
        if let Some(holder) = holders.get(&id) {
            return (Arc::clone(holder), false);
        }
        let holder = Arc::new(StreamHolder::open(
            Arc::clone(&self.driver),
            id,
            self.config.clone(),
        ));
        holders.insert(id, Arc::clone(&holder));
        (holder, true)
    }

    /// Remove and shut down the holder of a detached device, then notify
    /// the host. The holder is shut down outside the registry lock.
    pub fn on_detach(&self, id: DeviceId) {
        let removed = self.holders().remove(&id);
        match removed {
            Some(holder) => {
                holder.shutdown();
                info!("device {} detached", id);
                self.notify(id, false);
            }
            None => debug!("DeviceRegistry::on_detach() - device {} was not held", id),
        }
    }

    /// Holder of `id` without waiting for the registry lock.
    pub fn holder(&self, id: DeviceId) -> Result<Arc<StreamHolder>, Error> {
        self.try_holders(id)?
            .get(&id)
            .cloned()
            .ok_or(Error::DeviceNotFound(id))
    }

    /// Run `f` on the holder of `id` while holding the registry lock, so
    /// the holder cannot be detached underneath it.
    pub fn with_holder<T>(
        &self,
        id: DeviceId,
        f: impl FnOnce(&StreamHolder) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let holders = self.holders();
        let holder = holders.get(&id).ok_or(Error::DeviceNotFound(id))?;
        f(holder)
    }

    /// Whether a holder exists for `id` and the registry is not busy.
    pub fn is_available(&self, id: DeviceId) -> bool {
        self.holder(id).is_ok()
    }

    /// Streaming state as seen by the host, `Disconnected` when no holder
    /// exists or the registry is busy.
    pub fn device_state(&self, id: DeviceId) -> DeviceState {
        match self.holder(id) {
            Ok(holder) if holder.is_running() => DeviceState::Streaming,
            Ok(_) => DeviceState::Connected,
            Err(_) => DeviceState::Disconnected,
        }
    }

    pub fn device_info(&self, id: DeviceId) -> Result<DeviceInfo, Error> {
        let _holder = self.holder(id)?;
        self.driver.device_info(id)
    }

    /// Ids of all held devices in ascending order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.holders().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.holders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders().is_empty()
    }

    /// Shut down every holder and empty the registry.
    pub fn terminate_all(&self) {
        let drained: Vec<(DeviceId, Arc<StreamHolder>)> = self.holders().drain().collect();
        if drained.is_empty() {
            return;
        }
        debug!("DeviceRegistry::terminate_all() - {} holders", drained.len());
        for (id, holder) in drained {
            holder.shutdown();
            if Arc::strong_count(&holder) > 1 {
                warn!("device {} holder still referenced after shutdown", id);
            }
        }
    }
}

impl OnDeviceEvent for DeviceRegistry {
    fn on_device_event(&self, id: DeviceId, attached: bool) {
        if attached {
            self.on_attach(id);
        } else {
            self.on_detach(id);
        }
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.device_ids())
            .finish()
    }
}
