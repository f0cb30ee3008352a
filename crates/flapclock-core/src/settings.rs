//! Persisted user settings abstraction.

use core::fmt::Debug;

use heapless::String;

use crate::schedule::ScheduleWindow;

pub const SSID_MAX_BYTES: usize = 32;
pub const PASSWORD_MAX_BYTES: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WifiCredentials {
    pub ssid: String<SSID_MAX_BYTES>,
    pub password: String<PASSWORD_MAX_BYTES>,
}

impl WifiCredentials {
    /// Returns `None` when the SSID is empty or either field is too long.
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        if ssid.is_empty() {
            return None;
        }

        let mut creds = Self {
            ssid: String::new(),
            password: String::new(),
        };
        creds.ssid.push_str(ssid).ok()?;
        creds.password.push_str(password).ok()?;
        Some(creds)
    }
}

/// User-tunable settings that should survive reboot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PersistedSettings {
    pub credentials: Option<WifiCredentials>,
    pub window: ScheduleWindow,
}

impl PersistedSettings {
    pub const fn new(window: ScheduleWindow) -> Self {
        Self {
            credentials: None,
            window,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<WifiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Abstract settings persistence backend.
pub trait SettingsStore {
    type Error: Debug;

    fn load(&mut self) -> Result<Option<PersistedSettings>, Self::Error>;
    fn save(&mut self, settings: &PersistedSettings) -> Result<(), Self::Error>;
    /// Erases everything written by [`SettingsStore::save`].
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// A missing store keeps settings for the current boot only.
impl<S> SettingsStore for Option<S>
where
    S: SettingsStore,
{
    type Error = S::Error;

    fn load(&mut self) -> Result<Option<PersistedSettings>, Self::Error> {
        match self {
            Some(store) => store.load(),
            None => Ok(None),
        }
    }

    fn save(&mut self, settings: &PersistedSettings) -> Result<(), Self::Error> {
        match self {
            Some(store) => store.save(settings),
            None => Ok(()),
        }
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        match self {
            Some(store) => store.clear(),
            None => Ok(()),
        }
    }
}
