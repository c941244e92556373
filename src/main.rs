use std::time::Duration;

use anyhow::{Context, Error};
use log::{error, info, warn};
use mailbox_sensor::{device, prelude::*};
use tokio::time::{sleep, Instant};

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load the config file
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate().context("invalid configuration")?;
    info!("Starting mailbox sensor '{}'", config.hostname);

    // If the loop stops feeding the watchdog, start over
    let (watchdog, _watchdog_task) = Watchdog::start(
        Duration::from_millis(config.watchdog_timeout_ms),
        || device::reset("watchdog expired"),
    );

    let mut led = StatusLed::init(config.status_led.as_ref())?;
    let mut reed_switch = ReedSwitch::init(&config.reed_switch)?;

    // Bring up the network
    let mut link = SystemLink::new(config.network.interface.clone());
    if config.network.disable_power_save {
        if let Err(e) = link.disable_power_save().await {
            warn!("WIFI: could not disable power save on {}: {}", link.interface(), e);
        }
    }
    let retry_interval = Duration::from_secs(config.network.retry_interval);
    if let Err(e) = connect_with_retries(
        &mut link,
        &watchdog,
        &mut led,
        config.network.connection_attempts,
        retry_interval,
    )
    .await
    {
        device::reset(&e.to_string());
    }
    watchdog.feed();

    // Pick up newer files before doing anything else
    let mut updater = match &config.ota {
        Some(ota) => Some(OtaUpdater::new(ota)?.watching(watchdog.clone())),
        None => None,
    };
    check_for_updates(updater.as_mut(), &watchdog).await;
    let ota_interval = config
        .ota
        .as_ref()
        .map(|ota| Duration::from_secs(ota.check_interval));
    let mut last_ota_check = Instant::now();

    let notifier = HttpNotifier::new(&config.notify, &config.hostname)?;
    let mut mailbox = MailboxStateMachine::restore(&config.mailbox, notifier);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    info!("Starting event loop");
    let event_loop = async {
        loop {
            match reed_switch.door_closed() {
                Ok(door_closed) => match mailbox.handle_event(door_closed).await {
                    Ok(Some(hold)) => {
                        hold_while_open(hold, &mut reed_switch, &watchdog).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Mailbox: {}", e);
                        mailbox.try_save_state();
                        device::reset(&e.to_string());
                    }
                },
                Err(e) => error!("Reed switch: {}", e),
            }

            if !link.is_connected().await {
                warn!("WIFI: restart network connection");
                if let Err(e) = connect_with_retries(
                    &mut link,
                    &watchdog,
                    &mut led,
                    config.network.connection_attempts,
                    retry_interval,
                )
                .await
                {
                    mailbox.try_save_state();
                    device::reset(&e.to_string());
                }
            }

            if let Some(interval) = ota_interval {
                if last_ota_check.elapsed() >= interval {
                    last_ota_check = Instant::now();
                    mailbox.try_save_state();
                    check_for_updates(updater.as_mut(), &watchdog).await;
                }
            }

            watchdog.feed();
            sleep(poll_interval).await;
        }
    };

    tokio::select! {
        _ = event_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    mailbox.save_state()?;
    Ok(())
}

async fn check_for_updates(updater: Option<&mut OtaUpdater>, watchdog: &Watchdog) {
    let Some(updater) = updater else {
        return;
    };

    match updater.updated().await {
        Ok(true) => device::reset("OTA update installed"),
        Ok(false) => info!("OTA: up to date"),
        Err(e) => warn!("OTA: update check failed: {}", e),
    }
    watchdog.feed();
}
