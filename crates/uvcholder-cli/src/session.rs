// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Driver, registry and event channel for one CLI invocation.

use crate::error::CliError;
use std::{
    sync::{mpsc::Receiver, Arc},
    time::{Duration, Instant},
};
use uvcholder::{
    config::HolderConfig,
    host::{self, DeviceEvent},
    native::NativeDriver,
    sim::SimulatedDevice,
    DeviceId, DeviceRegistry, StreamHolder,
};

/// Device id of the simulated camera.
pub const SIM_DEVICE: DeviceId = 1;

/// How long commands addressing one device wait for it to attach.
pub const DEVICE_WAIT: Duration = Duration::from_secs(3);

enum Backend {
    Simulated(Arc<SimulatedDevice>),
    Native(Arc<NativeDriver>),
}

pub struct Session {
    registry: Arc<DeviceRegistry>,
    events: Receiver<DeviceEvent>,
    backend: Backend,
}

impl Session {
    pub fn open(simulate: bool, config: HolderConfig) -> Result<Session, CliError> {
        let (notifier, events) = host::channel();

        if simulate {
            let sim = Arc::new(SimulatedDevice::new());
            let registry = Arc::new(DeviceRegistry::new(sim.clone(), config).with_notifier(notifier));
            sim.subscribe(Arc::downgrade(&registry) as _);
            sim.attach(SIM_DEVICE);
            log::debug!("Simulated device {} attached", SIM_DEVICE);
            return Ok(Session {
                registry,
                events,
                backend: Backend::Simulated(sim),
            });
        }

        let driver = Arc::new(NativeDriver::new()?);
        let registry = Arc::new(DeviceRegistry::new(driver.clone(), config).with_notifier(notifier));
        driver.subscribe(Arc::downgrade(&registry) as _);
        log::debug!("Native driver ready");
        Ok(Session {
            registry,
            events,
            backend: Backend::Native(driver),
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.backend, Backend::Simulated(_))
    }

    /// Collect attach and detach events for `wait`, then return the ids of
    /// all attached devices.
    pub fn wait_for_devices(&self, wait: Duration) -> Vec<DeviceId> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.events.recv_timeout(remaining) {
                Ok(event) => log::debug!(
                    "device {} {}",
                    event.device_id,
                    if event.attached { "attached" } else { "detached" }
                ),
                Err(_) => break,
            }
        }
        self.registry.device_ids()
    }

    /// Holder for `id`, waiting up to [`DEVICE_WAIT`] for it to attach.
    pub fn holder(&self, id: DeviceId) -> Result<Arc<StreamHolder>, CliError> {
        let deadline = Instant::now() + DEVICE_WAIT;
        loop {
            match self.registry.holder(id) {
                Ok(holder) => return Ok(holder),
                Err(uvcholder::Error::DeviceNotFound(_)) if Instant::now() < deadline => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    // any event may be the one we wait for, recheck after each
                    let _ = self
                        .events
                        .recv_timeout(remaining.min(Duration::from_millis(100)));
                }
                Err(uvcholder::Error::Unavailable(_)) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.terminate_all();
        match &self.backend {
            Backend::Simulated(sim) => log::debug!("Simulated device served {} pulls", sim.pulls()),
            Backend::Native(driver) => log::debug!("Releasing {:?}", driver),
        }
    }
}
