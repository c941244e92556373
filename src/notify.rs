use std::future::Future;

use common::{Notification, REQUEST_CONTENT_TYPE};
use log::{info, warn};
use reqwest::header::CONTENT_TYPE;

use crate::{
    config::NotifyConfig,
    error::NotifyError,
    memory::{MemoryProbe, ProcMeminfo},
};

/// Delivers mailbox notifications to the user.
pub trait Notifier {
    fn notify(
        &mut self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// POSTs each notification to `request_url` with the notification's path
/// appended, then makes sure the request did not leave us short on memory.
pub struct HttpNotifier<M = ProcMeminfo> {
    client: reqwest::Client,
    request_url: String,
    minimum_memory: u64,
    memory: M,
}

impl HttpNotifier<ProcMeminfo> {
    pub fn new(config: &NotifyConfig, hostname: &str) -> Result<Self, NotifyError> {
        Self::with_probe(config, hostname, ProcMeminfo)
    }
}

impl<M: MemoryProbe> HttpNotifier<M> {
    pub fn with_probe(config: &NotifyConfig, hostname: &str, memory: M) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .user_agent(hostname)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            request_url: config.request_url.clone(),
            minimum_memory: config.minimum_memory,
            memory,
        })
    }

    pub fn url_for(&self, notification: Notification) -> String {
        format!("{}{}", self.request_url, notification.path())
    }

    fn check_memory(&self) -> Result<(), NotifyError> {
        match self.memory.available() {
            Some(available) if available < self.minimum_memory => Err(NotifyError::LowMemory {
                available,
                minimum: self.minimum_memory,
            }),
            _ => Ok(()),
        }
    }
}

impl<M: MemoryProbe + Send> Notifier for HttpNotifier<M> {
    async fn notify(&mut self, notification: Notification) -> Result<(), NotifyError> {
        let url = self.url_for(notification);
        info!("notify: POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("notify: {} answered {}", url, response.status());
        }
        drop(response);

        self.check_memory()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{extract::Path, http::HeaderMap, routing::post, Router};

    use super::*;
    use crate::memory::FixedMemory;

    /// Keeps every notification it is asked to send
    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<Notification>>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&mut self, notification: Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::LowMemory {
                    available: 0,
                    minimum: 1,
                });
            }
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn config(request_url: String, minimum_memory: u64) -> NotifyConfig {
        NotifyConfig {
            request_url,
            minimum_memory,
            request_timeout_ms: 5000,
        }
    }

    #[tokio::test]
    async fn test_posts_notification_path() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let router = Router::new().route(
            "/:state",
            post(move |Path(state): Path<String>, headers: HeaderMap| {
                let seen = seen_clone.clone();
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let agent = headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push((state, content_type, agent));
                    "ok"
                }
            }),
        );
        let url = serve(router).await;

        let mut notifier =
            HttpNotifier::with_probe(&config(url, 1000), "mailbox", FixedMemory(Some(5000)))
                .unwrap();
        notifier.notify(Notification::Open).await.unwrap();
        notifier.notify(Notification::Ajar).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (
                    "open".to_string(),
                    "application/json".to_string(),
                    "mailbox".to_string()
                ),
                (
                    "ajar".to_string(),
                    "application/json".to_string(),
                    "mailbox".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_low_memory_after_request() {
        let router = Router::new().route("/:state", post(|| async { "ok" }));
        let url = serve(router).await;

        let mut notifier =
            HttpNotifier::with_probe(&config(url, 32_000), "mailbox", FixedMemory(Some(1000)))
                .unwrap();
        let err = notifier.notify(Notification::Closed).await.unwrap_err();
        assert!(matches!(
            err,
            NotifyError::LowMemory {
                available: 1000,
                minimum: 32_000
            }
        ));
    }

    #[tokio::test]
    async fn test_error_status_is_not_fatal() {
        let router = Router::new().route(
            "/:state",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = serve(router).await;

        let mut notifier =
            HttpNotifier::with_probe(&config(url, 0), "mailbox", FixedMemory(None)).unwrap();
        assert!(notifier.notify(Notification::Open).await.is_ok());
    }

    #[tokio::test]
    async fn test_slow_relay_times_out() {
        let router = Router::new().route(
            "/:state",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "ok"
            }),
        );
        let url = serve(router).await;

        let mut config = config(url, 0);
        config.request_timeout_ms = 200;
        let mut notifier = HttpNotifier::with_probe(&config, "mailbox", FixedMemory(None)).unwrap();
        match notifier.notify(Notification::Open).await {
            Err(NotifyError::Request(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let mut notifier = HttpNotifier::with_probe(
            &config("http://127.0.0.1:1/".to_string(), 0),
            "mailbox",
            FixedMemory(None),
        )
        .unwrap();
        let err = notifier.notify(Notification::Open).await.unwrap_err();
        assert!(matches!(err, NotifyError::Request(_)));
    }
}
