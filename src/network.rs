use std::{future::Future, path::PathBuf, time::Duration};

use log::{info, warn};
use tokio::process::Command;

use crate::{error::NetworkError, sensor::StatusLed, watchdog::Watchdog};

/// A network connection the daemon depends on.
pub trait Link {
    fn is_connected(&mut self) -> impl Future<Output = bool> + Send;
    fn connect(&mut self) -> impl Future<Output = Result<(), NetworkError>> + Send;
}

/// The Wi-Fi interface of the host, driven through NetworkManager.
pub struct SystemLink {
    interface: String,
    sysfs_root: PathBuf,
}

impl SystemLink {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Power management makes the radio drop off the network, keep it on
    pub async fn disable_power_save(&self) -> Result<(), NetworkError> {
        run(
            "iw",
            &["dev", &self.interface, "set", "power_save", "off"],
        )
        .await
    }
}

impl Link for SystemLink {
    async fn is_connected(&mut self) -> bool {
        let operstate = self.sysfs_root.join(&self.interface).join("operstate");
        match tokio::fs::read_to_string(&operstate).await {
            Ok(state) => state.trim() == "up",
            Err(_) => false,
        }
    }

    async fn connect(&mut self) -> Result<(), NetworkError> {
        run("nmcli", &["device", "connect", &self.interface]).await
    }
}

async fn run(program: &str, args: &[&str]) -> Result<(), NetworkError> {
    let command = format!("{} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|source| NetworkError::Command {
            command: command.clone(),
            source,
        })?;

    if !status.success() {
        return Err(NetworkError::CommandFailed {
            command,
            status: status.to_string(),
        });
    }
    Ok(())
}

/// Bring the link up, requesting a connection every `interval` until it is
/// up. Gives up once more than `attempts` requests have gone unanswered. The
/// watchdog is fed between attempts and the LED is lit once connected.
pub async fn connect_with_retries<L: Link>(
    link: &mut L,
    watchdog: &Watchdog,
    led: &mut StatusLed,
    attempts: u32,
    interval: Duration,
) -> Result<(), NetworkError> {
    led.set(false);
    info!("WIFI: attempting network connection");

    let mut counter = 0;
    while !link.is_connected().await {
        info!("WIFI: attempt {}", counter);
        if let Err(e) = link.connect().await {
            warn!("WIFI: {}", e);
        }
        tokio::time::sleep(interval).await;
        watchdog.feed();

        counter += 1;
        if counter > attempts && !link.is_connected().await {
            warn!("WIFI: max connection attempts exceeded");
            return Err(NetworkError::AttemptsExceeded(attempts));
        }
    }

    led.set(true);
    info!("WIFI: successfully connected to network");
    Ok(())
}
