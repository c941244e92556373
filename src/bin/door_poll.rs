//! Print the state of the mailbox door once a second. Useful for checking the
//! reed switch wiring before running the full sensor.

use std::time::Duration;

use anyhow::Error;
use mailbox_sensor::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut reed_switch = ReedSwitch::init(&config.reed_switch)?;

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tick.tick().await;
        match reed_switch.door_closed()? {
            true => println!("closed"),
            false => println!("open"),
        }
    }
}
