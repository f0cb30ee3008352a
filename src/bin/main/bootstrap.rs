use flapclock_core::settings::{PersistedSettings, SettingsStore, WifiCredentials};
use log::{info, warn};

const BOOTSTRAP_SSID: Option<&str> = option_env!("FLAPCLOCK_WIFI_SSID");
const BOOTSTRAP_PASSWORD: Option<&str> = option_env!("FLAPCLOCK_WIFI_PASSWORD");

/// Writes build-time WiFi credentials when the store holds none, so a
/// development board skips the setup portal on first boot.
pub(super) fn seed_credentials<S: SettingsStore>(store: &mut S) {
    let Some(ssid) = BOOTSTRAP_SSID else {
        return;
    };
    let Some(credentials) = WifiCredentials::new(ssid, BOOTSTRAP_PASSWORD.unwrap_or("")) else {
        warn!("bootstrap: FLAPCLOCK_WIFI_SSID/PASSWORD rejected (empty or too long)");
        return;
    };

    let settings = match store.load() {
        Ok(Some(saved)) if saved.credentials.is_some() => return,
        Ok(Some(saved)) => saved,
        Ok(None) => PersistedSettings::default(),
        Err(err) => {
            warn!("bootstrap: stored settings unreadable err={:?}; replacing", err);
            PersistedSettings::default()
        }
    };

    match store.save(&settings.with_credentials(Some(credentials))) {
        Ok(()) => info!("bootstrap: seeded credentials for ssid={}", ssid),
        Err(err) => warn!("bootstrap: save failed err={:?}", err),
    }
}
