//! Wi-Fi state shared between the clock loop and the async radio workers.
//!
//! The clock loop never awaits the radio. It posts [`WifiCommand`]s through a
//! [`WifiLink`] and reads back a lock-free [`LinkStatus`]; the workers in
//! this module do the actual association, DHCP and captive-portal serving.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::channel::Channel;
use flapclock_core::{
    network::{LinkStatus, NetworkBackend, PortalConfig},
    provisioning::{ProvisioningDefaults, ProvisioningSubmission},
    settings::WifiCredentials,
};
use log::warn;

mod dhcp;
mod dns;
mod portal;
mod wifi;

pub use dhcp::dhcp_server_loop;
pub use dns::dns_server_loop;
pub use portal::portal_http_loop;
pub use wifi::wifi_link_loop;

const COMMAND_QUEUE_DEPTH: usize = 4;

/// Lock-free shared station status.
///
/// Every join or leave request bumps `generation`; a worker reporting the
/// outcome of a join is ignored when a newer request has been made since.
#[derive(Debug)]
pub struct LinkHandle {
    status: AtomicU8,
    generation: AtomicU32,
}

impl LinkHandle {
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(0),
            generation: AtomicU32::new(0),
        }
    }

    pub fn status(&self) -> LinkStatus {
        status_from_raw(self.status.load(Ordering::Acquire))
    }

    /// Starts a new join and returns its generation.
    pub fn mark_joining(&self) -> u32 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.store_status(LinkStatus::Joining);
        generation
    }

    pub fn mark_idle(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.store_status(LinkStatus::Idle);
    }

    /// Records a join outcome. Returns `false` when the join was superseded.
    pub fn finish_join(&self, generation: u32, connected: bool) -> bool {
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.store_status(if connected {
            LinkStatus::Connected
        } else {
            LinkStatus::Failed
        });
        true
    }

    fn store_status(&self, next: LinkStatus) {
        self.status.store(status_to_raw(next), Ordering::Release);
    }
}

impl Default for LinkHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn status_to_raw(status: LinkStatus) -> u8 {
    match status {
        LinkStatus::Idle => 0,
        LinkStatus::Joining => 1,
        LinkStatus::Connected => 2,
        LinkStatus::Failed => 3,
    }
}

fn status_from_raw(raw: u8) -> LinkStatus {
    match raw {
        1 => LinkStatus::Joining,
        2 => LinkStatus::Connected,
        3 => LinkStatus::Failed,
        _ => LinkStatus::Idle,
    }
}

#[derive(Clone, Debug)]
pub enum WifiCommand {
    Join {
        credentials: WifiCredentials,
        generation: u32,
    },
    Leave,
    StartPortal(PortalConfig),
    StopPortal,
}

/// Everything the radio workers and the clock loop share.
pub struct WifiLink {
    status: LinkHandle,
    commands: Channel<CriticalSectionRawMutex, WifiCommand, COMMAND_QUEUE_DEPTH>,
    submissions: Channel<CriticalSectionRawMutex, ProvisioningSubmission, 1>,
    defaults: Mutex<CriticalSectionRawMutex, RefCell<Option<ProvisioningDefaults>>>,
}

impl WifiLink {
    pub const fn new() -> Self {
        Self {
            status: LinkHandle::new(),
            commands: Channel::new(),
            submissions: Channel::new(),
            defaults: Mutex::new(RefCell::new(None)),
        }
    }

    fn portal_defaults(&self) -> ProvisioningDefaults {
        self.defaults
            .lock(|defaults| defaults.borrow().clone())
            .unwrap_or_default()
    }

    fn set_portal_defaults(&self, defaults: &ProvisioningDefaults) {
        self.defaults
            .lock(|slot| *slot.borrow_mut() = Some(defaults.clone()));
    }

    fn post(&self, command: WifiCommand) -> Result<(), NetworkError> {
        self.commands
            .try_send(command)
            .map_err(|_| NetworkError::CommandQueueFull)
    }
}

impl Default for WifiLink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NetworkError {
    CommandQueueFull,
}

/// [`NetworkBackend`] handed to the clock loop.
#[derive(Clone, Copy)]
pub struct EspNetwork {
    link: &'static WifiLink,
}

impl EspNetwork {
    pub const fn new(link: &'static WifiLink) -> Self {
        Self { link }
    }
}

impl NetworkBackend for EspNetwork {
    type Error = NetworkError;

    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), Self::Error> {
        let generation = self.link.status.mark_joining();
        let posted = self.link.post(WifiCommand::Join {
            credentials: credentials.clone(),
            generation,
        });
        if posted.is_err() {
            self.link.status.finish_join(generation, false);
        }
        posted
    }

    fn link_status(&self) -> LinkStatus {
        self.link.status.status()
    }

    fn leave(&mut self) {
        self.link.status.mark_idle();
        if let Err(err) = self.link.post(WifiCommand::Leave) {
            warn!("wifi: leave not queued err={:?}", err);
        }
    }

    fn start_portal(
        &mut self,
        portal: &PortalConfig,
        defaults: &ProvisioningDefaults,
    ) -> Result<(), Self::Error> {
        self.link.set_portal_defaults(defaults);
        self.link.post(WifiCommand::StartPortal(*portal))
    }

    fn poll_portal(&mut self) -> Option<ProvisioningSubmission> {
        self.link.submissions.try_receive().ok()
    }

    fn stop_portal(&mut self) {
        if let Err(err) = self.link.post(WifiCommand::StopPortal) {
            warn!("portal: stop not queued err={:?}", err);
        }
    }
}
