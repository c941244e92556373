use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Error};
use pi_pinout::{GpioPin, PhysicalPin, WiringPiPin};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

pub const CONFIG_FILE: &str = "config.ron";

/// Environment variable that overrides the GitHub token from the config file
pub const GITHUB_TOKEN_ENV: &str = "MAILBOX_GITHUB_TOKEN";

/// Longest hostname the network stack keeps without truncating
pub const MAX_HOSTNAME_LEN: usize = 15;

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub hostname: String,
    pub reed_switch: ReedSwitchConfig,
    #[serde(default)]
    pub status_led: Option<Pin>,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub ota: Option<OtaConfig>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub enum Pin {
    Physical(PhysicalPin),
    Gpio(GpioPin),
    WiringPi(WiringPiPin),
}

impl Pin {
    /// Reject header pins that carry power or ground, and BCM numbers past
    /// the last GPIO on the 40 pin header.
    pub fn check(&self) -> Result<(), SensorError> {
        let usable = match self {
            Pin::Physical(pin) => {
                (1..=40).contains(&pin.0)
                    && !matches!(pin.0, 1 | 2 | 4 | 6 | 9 | 14 | 17 | 20 | 25 | 30 | 34 | 39)
            }
            Pin::Gpio(pin) => matches!(pin.0, 0..=27),
            Pin::WiringPi(_) => true,
        };
        match usable {
            true => Ok(()),
            false => Err(SensorError::InvalidPin(format!("{:?}", self))),
        }
    }

    /// The BCM GPIO number for this pin, whatever numbering it was given in
    pub fn gpio(&self) -> GpioPin {
        match *self {
            Pin::Physical(pin) => pin.into(),
            Pin::Gpio(pin) => pin,
            Pin::WiringPi(pin) => pin.into(),
        }
    }
}

/// Logic level the reed switch pin reads when the door is shut
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Level {
    #[default]
    High,
    Low,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ReedSwitchConfig {
    pub pin: Pin,
    #[serde(default)]
    pub closed_level: Level,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct NotifyConfig {
    /// Base URL, the notification path is appended to it
    pub request_url: String,
    /// Bytes of available memory below which the daemon restarts itself
    #[serde(default = "default_minimum_memory")]
    pub minimum_memory: u64,
    /// Milliseconds before a notification request is abandoned
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl NotifyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct MailboxConfig {
    /// Seconds to wait for the door to shut after it has been opened
    #[serde(default = "default_quick_door_close_timer")]
    pub quick_door_close_timer: u64,
    #[serde(default = "default_backoff_timer_base")]
    pub backoff_timer_base: u64,
    #[serde(default = "default_backoff_timer_range_start")]
    pub backoff_timer_range_start: u32,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            quick_door_close_timer: default_quick_door_close_timer(),
            backoff_timer_base: default_backoff_timer_base(),
            backoff_timer_range_start: default_backoff_timer_range_start(),
            state_file: default_state_file(),
        }
    }
}

impl MailboxConfig {
    pub fn quick_door_close(&self) -> Duration {
        Duration::from_secs(self.quick_door_close_timer)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_connection_attempts")]
    pub connection_attempts: u32,
    /// Seconds between connection attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    #[serde(default = "default_true")]
    pub disable_power_save: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            connection_attempts: default_connection_attempts(),
            retry_interval: default_retry_interval(),
            disable_power_save: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct OtaConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub github_user: Option<String>,
    #[serde(default)]
    pub github_token: Option<String>,
    /// "owner/repo" to the files tracked in that repository
    pub repositories: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    /// Seconds between update checks while the daemon runs
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_versions_file")]
    pub versions_file: PathBuf,
    /// Milliseconds before a single GitHub request is abandoned
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl OtaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The token from the environment wins over the one in the config file
    pub fn token(&self) -> Option<String> {
        std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .or_else(|| self.github_token.clone())
    }
}

fn default_watchdog_timeout_ms() -> u64 {
    8000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_minimum_memory() -> u64 {
    32_000_000
}

fn default_quick_door_close_timer() -> u64 {
    60
}

fn default_backoff_timer_base() -> u64 {
    3
}

fn default_backoff_timer_range_start() -> u32 {
    4
}

fn default_state_file() -> PathBuf {
    PathBuf::from("mailbox_state.json")
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_connection_attempts() -> u32 {
    20
}

fn default_retry_interval() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_check_interval() -> u64 {
    3600
}

fn default_versions_file() -> PathBuf {
    PathBuf::from("versions.json")
}

impl Config {
    pub fn load() -> Result<Config, Error> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&config)
    }

    pub fn parse(contents: &str) -> Result<Config, Error> {
        let config: Config = ron::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_hostname(&self.hostname)?;
        self.reed_switch.pin.check()?;
        if let Some(pin) = &self.status_led {
            pin.check()?;
        }

        if !self.notify.request_url.starts_with("http://")
            && !self.notify.request_url.starts_with("https://")
        {
            bail!("request_url must be an http(s) URL: {}", self.notify.request_url);
        }
        if self.mailbox.backoff_timer_base < 2 {
            bail!("backoff_timer_base must be at least 2");
        }
        if self.network.connection_attempts == 0 {
            bail!("connection_attempts must be at least 1");
        }
        if self.watchdog_timeout_ms == 0 {
            bail!("watchdog_timeout_ms must be non-zero");
        }
        if self.notify.request_timeout_ms == 0
            || self.notify.request_timeout_ms >= self.watchdog_timeout_ms
        {
            bail!("notify request_timeout_ms must be between 1 and watchdog_timeout_ms");
        }
        if let Some(ota) = &self.ota {
            if ota.request_timeout_ms == 0 || ota.request_timeout_ms >= self.watchdog_timeout_ms {
                bail!("OTA request_timeout_ms must be between 1 and watchdog_timeout_ms");
            }
            for repository in ota.repositories.keys() {
                if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
                    bail!("OTA repository must be \"owner/repo\": {}", repository);
                }
            }
        }

        Ok(())
    }
}

pub fn validate_hostname(hostname: &str) -> Result<(), Error> {
    if hostname.is_empty() || hostname.len() > MAX_HOSTNAME_LEN {
        bail!(
            "hostname {:?} must be between 1 and {} characters",
            hostname,
            MAX_HOSTNAME_LEN
        );
    }
    if !hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        bail!("hostname {:?} may only contain letters, digits and '-'", hostname);
    }
    if hostname.starts_with('-') || hostname.ends_with('-') {
        bail!("hostname {:?} may not start or end with '-'", hostname);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"(
    hostname: "mailbox",
    reed_switch: (
        pin: Gpio(GpioPin(22)),
    ),
    status_led: Some(Physical(PhysicalPin(11))),
    notify: (
        request_url: "https://example.com/mailbox/",
    ),
    ota: Some((
        repositories: {
            "gamename/mailbox-sensor": ["config.ron"],
        },
    )),
)"#;

    #[test]
    fn test_load() {
        let path = std::env::temp_dir().join(format!("mailbox-config-{}.ron", std::process::id()));
        std::fs::write(&path, EXAMPLE).unwrap();

        let config = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.hostname, "mailbox");
        assert_eq!(
            config.reed_switch,
            ReedSwitchConfig {
                pin: Pin::Gpio(pi_pinout::GpioPin(22)),
                closed_level: Level::High,
            }
        );
        assert_eq!(
            config.status_led,
            Some(Pin::Physical(pi_pinout::PhysicalPin(11)))
        );
        assert_eq!(config.notify.minimum_memory, 32_000_000);
        assert_eq!(config.mailbox, MailboxConfig::default());
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.watchdog_timeout_ms, 8000);

        let ota = config.ota.as_ref().unwrap();
        assert_eq!(ota.api_url, "https://api.github.com");
        assert_eq!(ota.versions_file, PathBuf::from("versions.json"));
        assert_eq!(
            ota.repositories["gamename/mailbox-sensor"],
            vec!["config.ron".to_string()]
        );

        config.validate().unwrap();
    }

    #[test]
    fn test_mailbox_defaults() {
        let mailbox = MailboxConfig::default();
        assert_eq!(mailbox.quick_door_close(), Duration::from_secs(60));
        assert_eq!(mailbox.backoff_timer_base, 3);
        assert_eq!(mailbox.backoff_timer_range_start, 4);
        assert_eq!(mailbox.state_file, PathBuf::from("mailbox_state.json"));
    }

    #[test]
    fn test_hostname_limits() {
        assert!(validate_hostname("mailbox-sensor").is_ok());
        assert!(validate_hostname("pico-w-mailbox-1").is_err());
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("mail_box").is_err());
        assert!(validate_hostname("-mailbox").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::parse(EXAMPLE).unwrap();
        config.notify.request_url = "example.com".to_string();
        assert!(config.validate().is_err());

        // A request that outlives the watchdog would reset the device mid-flight
        let mut config = Config::parse(EXAMPLE).unwrap();
        assert_eq!(config.notify.request_timeout(), Duration::from_secs(5));
        config.notify.request_timeout_ms = config.watchdog_timeout_ms;
        assert!(config.validate().is_err());

        let mut config = Config::parse(EXAMPLE).unwrap();
        config.ota.as_mut().unwrap().request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::parse(EXAMPLE).unwrap();
        config
            .ota
            .as_mut()
            .unwrap()
            .repositories
            .insert("mailbox-sensor".to_string(), vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_power_pins_are_rejected() {
        assert!(Pin::Physical(pi_pinout::PhysicalPin(11)).check().is_ok());
        assert!(Pin::Gpio(pi_pinout::GpioPin(22)).check().is_ok());
        assert!(matches!(
            Pin::Physical(pi_pinout::PhysicalPin(1)).check(),
            Err(SensorError::InvalidPin(_))
        ));
        assert!(Pin::Physical(pi_pinout::PhysicalPin(6)).check().is_err());
        assert!(Pin::Gpio(pi_pinout::GpioPin(28)).check().is_err());

        let mut config = Config::parse(EXAMPLE).unwrap();
        config.status_led = Some(Pin::Physical(pi_pinout::PhysicalPin(1)));
        assert!(config.validate().is_err());
    }
}
