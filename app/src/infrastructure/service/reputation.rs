use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain_submission::exception::{SubmissionException, SubmissionResult};
use domain_submission::model::vo::{sentinel, RetryPolicy, Sleeper};
use domain_submission::service::ReputationService;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// VirusTotal-style client. Lookups are soft-fail and answer with the
/// error sentinel; bundle fetches are hard failures surfaced to the
/// caller.
#[derive(TypedBuilder)]
pub struct ReputationServiceImpl {
    #[builder(default)]
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

#[derive(Deserialize)]
struct FileReport {
    data: FileData,
}

#[derive(Deserialize)]
struct FileData {
    attributes: FileAttributes,
}

#[derive(Deserialize)]
struct FileAttributes {
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
}

#[derive(Deserialize, Default)]
struct AnalysisStats {
    #[serde(default)]
    malicious: i64,
}

#[derive(Deserialize)]
struct ZipCreated {
    data: ZipCreatedData,
}

#[derive(Deserialize)]
struct ZipCreatedData {
    id: String,
}

#[derive(Deserialize)]
struct ZipStatus {
    data: ZipStatusData,
}

#[derive(Deserialize)]
struct ZipStatusData {
    attributes: ZipStatusAttributes,
}

#[derive(Deserialize)]
struct ZipStatusAttributes {
    status: String,
}

#[derive(Deserialize)]
struct DownloadUrl {
    data: String,
}

#[async_trait]
impl ReputationService for ReputationServiceImpl {
    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup_positives(&self, hash: &str) -> i64 {
        let Some(api_key) = self.api_key.as_deref() else {
            return sentinel::LOOKUP_ERROR;
        };
        match self.try_lookup(api_key, hash).await {
            Ok(positives) => positives,
            Err(error) => {
                tracing::warn!(%hash, %error, "reputation lookup failed");
                sentinel::LOOKUP_ERROR
            }
        }
    }

    async fn fetch_bundle(
        &self,
        hashes: &[String],
        password: &str,
        cancel: CancellationToken,
    ) -> SubmissionResult<Vec<u8>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| SubmissionException::Bundle {
            reason: "no reputation api key configured".to_owned(),
        })?;
        tokio::select! {
            bundle = self.fetch_bundle_inner(api_key, hashes, password) => bundle,
            _ = cancel.cancelled() => Err(SubmissionException::Bundle {
                reason: "submission cancelled".to_owned(),
            }),
        }
    }
}

impl ReputationServiceImpl {
    async fn try_lookup(&self, api_key: &str, hash: &str) -> anyhow::Result<i64> {
        let report: FileReport = self
            .client
            .get(format!("{}/files/{hash}", self.base_url))
            .header("x-apikey", api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(report.data.attributes.last_analysis_stats.malicious)
    }

    /// Create the archive job, poll until finished, resolve the one-time
    /// download URL and fetch it.
    async fn fetch_bundle_inner(
        &self,
        api_key: &str,
        hashes: &[String],
        password: &str,
    ) -> SubmissionResult<Vec<u8>> {
        let payload = serde_json::json!({"data": {"password": password, "hashes": hashes}});
        let created: ZipCreated = self
            .client
            .post(format!("{}/intelligence/zip_files", self.base_url))
            .header("x-apikey", api_key)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(bundle_error)?
            .json()
            .await
            .map_err(bundle_error)?;

        let status_url =
            format!("{}/intelligence/zip_files/{}", self.base_url, created.data.id);
        let client = &self.client;
        let status_url_ref = status_url.as_str();
        poll_until_ready(&self.policy, self.sleeper.as_ref(), move || {
            let request = client.get(status_url_ref).header("x-apikey", api_key);
            async move {
                let status: ZipStatus = request
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)?
                    .json()
                    .await?;
                Ok::<_, reqwest::Error>(status.data.attributes.status == "finished")
            }
        })
        .await?;

        let url: DownloadUrl = self
            .client
            .get(format!("{status_url}/download_url"))
            .header("x-apikey", api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(bundle_error)?
            .json()
            .await
            .map_err(bundle_error)?;

        let bytes = self
            .client
            .get(url.data)
            .header("x-apikey", api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(bundle_error)?
            .bytes()
            .await
            .map_err(bundle_error)?;
        Ok(bytes.to_vec())
    }
}

fn bundle_error(error: impl std::fmt::Display) -> SubmissionException {
    SubmissionException::Bundle {
        reason: error.to_string(),
    }
}

/// Run `check` under the retry policy, sleeping between attempts. Check
/// errors abort immediately; running out of attempts reports how many
/// were made.
async fn poll_until_ready<F, Fut, E>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut check: F,
) -> SubmissionResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    for _ in 0..policy.max_attempts {
        if check().await.map_err(bundle_error)? {
            return Ok(());
        }
        sleeper.sleep(policy.delay()).await;
    }
    Err(SubmissionException::BundleNotReady {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use domain_submission::mock::MockSleeper;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay_secs: 10,
        }
    }

    /// One-shot HTTP stub answering every request with the given status
    /// line, returning the address to point the client at.
    async fn stub_server(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let response =
                    format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn not_found_lookup_yields_the_error_sentinel() {
        let base_url = stub_server("HTTP/1.1 404 Not Found").await;
        let service = ReputationServiceImpl::builder()
            .api_key(Some("key".to_owned()))
            .base_url(base_url)
            .policy(policy())
            .sleeper(Arc::new(MockSleeper::new()))
            .build();
        let positives = service.lookup_positives("0000000000000000").await;
        assert_eq!(positives, sentinel::LOOKUP_ERROR);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_without_real_sleeping() {
        let mut sleeper = MockSleeper::new();
        sleeper
            .expect_sleep()
            .withf(|d| *d == Duration::from_secs(10))
            .times(3)
            .returning(|_| ());

        let result =
            poll_until_ready(&policy(), &sleeper, || async { Ok::<_, anyhow::Error>(false) })
                .await;
        assert!(matches!(
            result,
            Err(SubmissionException::BundleNotReady { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn stops_polling_once_ready() {
        let mut sleeper = MockSleeper::new();
        sleeper.expect_sleep().times(1).returning(|_| ());

        let calls = AtomicU32::new(0);
        let result = poll_until_ready(&policy(), &sleeper, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(attempt == 1) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn check_errors_abort_immediately() {
        let mut sleeper = MockSleeper::new();
        sleeper.expect_sleep().times(0);

        let result = poll_until_ready(&policy(), &sleeper, || async {
            Err::<bool, _>(anyhow::anyhow!("status check failed"))
        })
        .await;
        assert!(matches!(result, Err(SubmissionException::Bundle { .. })));
    }
}
