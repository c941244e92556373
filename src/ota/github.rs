use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::error::OtaError;

const DEFAULT_USER_AGENT: &str = "mailbox-sensor";

/// The parts of a GitHub contents (or blob) response we look at. A missing
/// `sha` means GitHub answered with an error document instead.
#[derive(Debug, Default, Deserialize)]
pub struct Contents {
    pub sha: Option<String>,
    pub content: Option<String>,
    pub encoding: Option<String>,
    pub message: Option<String>,
}

pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(
        api_url: &str,
        user: Option<&str>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, OtaError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            if let Ok(value) = HeaderValue::from_str(&format!("token {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let user_agent = user.unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn contents_url(&self, repository: &str, filename: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_url, repository, filename)
    }

    pub fn blob_url(&self, repository: &str, sha: &str) -> String {
        format!("{}/repos/{}/git/blobs/{}", self.api_url, repository, sha)
    }

    pub async fn get(&self, url: &str) -> Result<Contents, OtaError> {
        debug!("OTA: GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        // GitHub error documents are JSON too, let the caller look at them
        match response.json::<Contents>().await {
            Ok(contents) => Ok(contents),
            Err(_) => Err(OtaError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

/// Decode a base64 `content` field, which GitHub wraps at 60 columns
pub fn decode_content(file: &str, content: &str) -> Result<Vec<u8>, OtaError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|source| OtaError::Decode {
        file: file.to_string(),
        source,
    })
}

/// The sha GitHub gives a blob with these bytes
pub fn git_blob_sha(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_blob_sha_matches_git() {
        // `printf 'hello world\n' | git hash-object --stdin`
        assert_eq!(
            git_blob_sha(b"hello world\n"),
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
        );
        // `git hash-object /dev/null`
        assert_eq!(git_blob_sha(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn test_decode_wrapped_content() {
        let decoded = decode_content("a.txt", "aGVsbG8g\nd29ybGQK\n").unwrap();
        assert_eq!(decoded, b"hello world\n");
        assert!(decode_content("a.txt", "not base64!").is_err());
    }

    #[test]
    fn test_urls() {
        let client = GitHubClient::new(
            "https://api.github.com/",
            None,
            Some("secret"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.contents_url("gamename/mailbox", "config.ron"),
            "https://api.github.com/repos/gamename/mailbox/contents/config.ron"
        );
        assert_eq!(
            client.blob_url("gamename/mailbox", "abc"),
            "https://api.github.com/repos/gamename/mailbox/git/blobs/abc"
        );
    }
}
