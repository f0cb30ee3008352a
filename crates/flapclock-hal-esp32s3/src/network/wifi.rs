use embassy_futures::select::{Either, select};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, WithTimeout};
use esp_radio::wifi::{
    AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, WifiController, WifiError,
};
use flapclock_core::{network::PortalConfig, settings::WifiCredentials};
use log::{info, warn};

use super::{WifiCommand, WifiLink};

const LINK_POLL_INTERVAL_MS: u64 = 500;
const DHCP_TIMEOUT_SECS: u64 = 15;

/// Radio worker. Executes queued commands and watches the station link.
pub async fn wifi_link_loop(
    controller: &mut WifiController<'_>,
    sta: Stack<'_>,
    link: &'static WifiLink,
) -> ! {
    let mut station: Option<WifiCredentials> = None;
    let mut portal: Option<PortalConfig> = None;
    let mut joined: Option<u32> = None;

    loop {
        let command = match select(
            link.commands.receive(),
            Timer::after_millis(LINK_POLL_INTERVAL_MS),
        )
        .await
        {
            Either::First(command) => Some(command),
            Either::Second(()) => None,
        };

        match command {
            Some(WifiCommand::Join {
                credentials,
                generation,
            }) => {
                if joined.take().is_some() {
                    let _ = controller.disconnect_async().await;
                }

                let connected = join(controller, sta, &credentials, portal.as_ref()).await;
                station = Some(credentials);

                if link.status.finish_join(generation, connected) {
                    joined = connected.then_some(generation);
                } else if connected {
                    info!("wifi: join superseded; dropping association");
                    let _ = controller.disconnect_async().await;
                }
            }
            Some(WifiCommand::Leave) => {
                if joined.take().is_some() || matches!(controller.is_connected(), Ok(true)) {
                    let _ = controller.disconnect_async().await;
                    info!("wifi: left network");
                }
            }
            Some(WifiCommand::StartPortal(config)) => {
                portal = Some(config);
                match apply_mode(controller, station.as_ref(), portal.as_ref()).await {
                    Ok(()) => info!("portal: access point up ssid={}", config.ssid),
                    Err(err) => warn!("portal: access point failed err={:?}", err),
                }
            }
            Some(WifiCommand::StopPortal) => {
                portal = None;
                if let Err(err) = apply_mode(controller, station.as_ref(), None).await {
                    warn!("portal: switching back to station failed err={:?}", err);
                }
            }
            None => {
                let Some(generation) = joined else {
                    continue;
                };

                let link_up = sta.is_link_up();
                let has_ipv4 = sta.config_v4().is_some();
                let is_connected = matches!(controller.is_connected(), Ok(true));

                if !(link_up && has_ipv4 && is_connected) {
                    info!(
                        "wifi state lost (link_up={} has_ipv4={} connected={})",
                        link_up, has_ipv4, is_connected
                    );
                    link.status.finish_join(generation, false);
                    joined = None;
                    let _ = controller.disconnect_async().await;
                }
            }
        }
    }
}

async fn join(
    controller: &mut WifiController<'_>,
    sta: Stack<'_>,
    credentials: &WifiCredentials,
    portal: Option<&PortalConfig>,
) -> bool {
    if let Err(err) = apply_mode(controller, Some(credentials), portal).await {
        warn!("wifi mode config failed: {:?}", err);
        return false;
    }

    info!("wifi: connecting ssid={}", credentials.ssid.as_str());
    if let Err(err) = controller.connect_async().await {
        info!("wifi connect failed: {:?}", err);
        let _ = controller.disconnect_async().await;
        return false;
    }

    match sta
        .wait_config_up()
        .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
        .await
    {
        Ok(()) => {
            info!("wifi connected and dhcp ready");
            true
        }
        Err(_) => {
            info!("dhcp timeout; dropping association");
            let _ = controller.disconnect_async().await;
            false
        }
    }
}

/// Applies the station/access-point combination and makes sure the radio
/// is running. With neither side configured the radio is stopped.
async fn apply_mode(
    controller: &mut WifiController<'_>,
    station: Option<&WifiCredentials>,
    portal: Option<&PortalConfig>,
) -> Result<(), WifiError> {
    let client = station.map(|credentials| {
        ClientConfig::default()
            .with_ssid(credentials.ssid.as_str().into())
            .with_password(credentials.password.as_str().into())
    });
    let access_point = portal.map(|portal| {
        AccessPointConfig::default()
            .with_ssid(portal.ssid.into())
            .with_password(portal.password.into())
            .with_auth_method(AuthMethod::Wpa2Personal)
    });

    let mode = match (client, access_point) {
        (Some(client), Some(access_point)) => ModeConfig::ApSta(client, access_point),
        (Some(client), None) => ModeConfig::Client(client),
        (None, Some(access_point)) => ModeConfig::AccessPoint(access_point),
        (None, None) => {
            if controller.is_started().unwrap_or(false) {
                controller.stop_async().await?;
            }
            return Ok(());
        }
    };

    controller.set_config(&mode)?;
    if !controller.is_started().unwrap_or(false) {
        controller.start_async().await?;
    }
    Ok(())
}
