//! Hammer the relay (or any URL) with requests and log how much memory is
//! left after each one. This is how the request leak was tracked down.
//!
//! Usage: `mem-soak [post|get <url>] [interval-seconds]`

use std::time::Duration;

use anyhow::{bail, Error};
use chrono::Local;
use common::REQUEST_CONTENT_TYPE;
use log::{error, info};
use mailbox_sensor::{
    memory::{MemoryProbe, ProcMeminfo},
    prelude::*,
};
use reqwest::header::CONTENT_TYPE;

enum Mode {
    Post(String),
    Get(String),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        None | Some("post") => {
            let config = Config::load()?;
            Mode::Post(format!(
                "{}{}",
                config.notify.request_url,
                Notification::Closed.path()
            ))
        }
        Some("get") => match args.next() {
            Some(url) => Mode::Get(url),
            None => bail!("get needs a URL"),
        },
        Some(other) => bail!("unknown mode {:?}, expected post or get", other),
    };
    let interval = Duration::from_secs(args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(30));

    let client = reqwest::Client::new();
    let started = Local::now();
    let mut counter: u64 = 1;
    info!("MEM: starting soak at {}", started.format("%Y-%m-%d %H:%M:%S"));

    loop {
        let free = ProcMeminfo
            .available()
            .map(|bytes| bytes.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let elapsed = Local::now() - started;
        info!(
            "MEM: count: {} free memory: {} elapsed: {}m",
            counter,
            free,
            elapsed.num_minutes()
        );

        let request = match &mode {
            Mode::Post(url) => client.post(url).header(CONTENT_TYPE, REQUEST_CONTENT_TYPE),
            Mode::Get(url) => client.get(url),
        };
        match request.send().await {
            Ok(response) => drop(response),
            Err(e) => error!("MEM: request failed: {}", e),
        }

        counter += 1;
        tokio::time::sleep(interval).await;
    }
}
