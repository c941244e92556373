use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::error;
use tokio::{task::JoinHandle, time::Instant};

/// Software watchdog. If nobody calls `feed` within the timeout, the expiry
/// action runs once and the watchdog stops watching.
#[derive(Clone)]
pub struct Watchdog {
    last_fed: Arc<Mutex<Instant>>,
    timeout: Duration,
}

impl Watchdog {
    pub fn start<F>(timeout: Duration, on_expire: F) -> (Self, JoinHandle<()>)
    where
        F: FnOnce() + Send + 'static,
    {
        let watchdog = Self {
            last_fed: Arc::new(Mutex::new(Instant::now())),
            timeout,
        };

        let monitor = watchdog.clone();
        let handle = tokio::spawn(async move {
            let check_every = (monitor.timeout / 4).max(Duration::from_millis(1));
            loop {
                tokio::time::sleep(check_every).await;
                if monitor.starved() {
                    error!(
                        "watchdog: not fed for {:?}, resetting",
                        monitor.timeout
                    );
                    on_expire();
                    break;
                }
            }
        });

        (watchdog, handle)
    }

    pub fn feed(&self) {
        if let Ok(mut last_fed) = self.last_fed.lock() {
            *last_fed = Instant::now();
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn starved(&self) -> bool {
        self.last_fed
            .lock()
            .map(|last_fed| last_fed.elapsed() > self.timeout)
            .unwrap_or(true)
    }
}
