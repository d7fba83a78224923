use std::collections::HashMap;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use domain_submission::exception::{SubmissionException, SubmissionResult};
use domain_submission::model::vo::ScanRecord;
use domain_submission::service::ScannerService;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use typed_builder::TypedBuilder;

use crate::infrastructure::config::ScannerConfig;
use crate::infrastructure::grpc::strelka::frontend_client::FrontendClient;
use crate::infrastructure::grpc::strelka::{Attributes, Request, ScanFileRequest};

/// Upload chunk size of the streaming scan call.
pub const SCAN_CHUNK_BYTES: usize = 8192;

const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn chunks(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes.chunks(SCAN_CHUNK_BYTES).map(<[u8]>::to_vec).collect()
}

#[derive(TypedBuilder)]
pub struct ScannerServiceImpl {
    config: ScannerConfig,
}

#[async_trait]
impl ScannerService for ScannerServiceImpl {
    async fn scan(
        &self,
        file_name: &str,
        bytes: &[u8],
        bypass_cache: bool,
        cancel: CancellationToken,
    ) -> SubmissionResult<Vec<ScanRecord>> {
        let deadline = Duration::from_secs(self.config.timeout_secs);
        let result = tokio::select! {
            scanned = tokio::time::timeout(deadline, self.scan_inner(file_name, bytes, bypass_cache)) => {
                match scanned {
                    Ok(inner) => inner,
                    Err(_) => Err(anyhow::anyhow!(
                        "no complete response within {}s",
                        self.config.timeout_secs
                    )),
                }
            }
            _ = cancel.cancelled() => Err(anyhow::anyhow!("submission cancelled")),
        };
        result.map_err(|source| SubmissionException::Scan {
            file_name: file_name.to_owned(),
            source,
        })
    }

    async fn status(&self) -> bool {
        let address = format!("{}:{}", self.config.host, self.config.port);
        match tokio::time::timeout(STATUS_PROBE_TIMEOUT, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                // An unreachable scanner is an expected state; anything
                // other than a plain refusal is worth a log line.
                if e.kind() != ErrorKind::ConnectionRefused {
                    tracing::error!(%address, error = %e, "scanner health probe failed");
                }
                false
            }
            Err(_) => false,
        }
    }
}

impl ScannerServiceImpl {
    async fn scan_inner(
        &self,
        file_name: &str,
        bytes: &[u8],
        bypass_cache: bool,
    ) -> anyhow::Result<Vec<ScanRecord>> {
        let channel = self.connect().await?;
        let mut client = FrontendClient::new(channel);
        let outbound = futures::stream::iter(self.requests(file_name, bytes, bypass_cache));
        let mut inbound = client.scan_file(outbound).await?.into_inner();

        let mut records = vec![];
        while let Some(response) = inbound.message().await? {
            records.push(serde_json::from_str::<ScanRecord>(&response.event)?);
        }
        Ok(records)
    }

    async fn connect(&self) -> anyhow::Result<Channel> {
        let channel = match &self.config.cert_path {
            Some(path) => {
                let pem = tokio::fs::read(path).await?;
                let tls = ClientTlsConfig::new()
                    .ca_certificate(Certificate::from_pem(pem))
                    .domain_name(self.config.host.clone());
                Endpoint::from_shared(format!("https://{}:{}", self.config.host, self.config.port))?
                    .tls_config(tls)?
                    .connect()
                    .await?
            }
            None => {
                Endpoint::from_shared(format!("http://{}:{}", self.config.host, self.config.port))?
                    .connect()
                    .await?
            }
        };
        Ok(channel)
    }

    /// Every chunked message repeats the request header and the client
    /// identity metadata; the Scanner reads them from the first message.
    fn requests(&self, file_name: &str, bytes: &[u8], bypass_cache: bool) -> Vec<ScanFileRequest> {
        let metadata = HashMap::from([
            ("client_name".to_owned(), self.config.client_name.clone()),
            ("client_hostname".to_owned(), self.config.client_hostname.clone()),
            ("client_version".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
        ]);
        chunks(bytes)
            .into_iter()
            .map(|data| ScanFileRequest {
                data,
                request: Some(Request {
                    id: String::new(),
                    client: self.config.client_name.clone(),
                    source: self.config.client_hostname.clone(),
                    gatekeeper: !bypass_cache,
                }),
                attributes: Some(Attributes {
                    filename: file_name.to_owned(),
                    metadata: metadata.clone(),
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_splits_at_8192() {
        let sizes: Vec<usize> = chunks(&vec![0u8; 20000]).iter().map(Vec::len).collect();
        assert_eq!(sizes, [8192, 8192, 3616]);
    }

    #[test]
    fn empty_payload_yields_no_chunks() {
        assert!(chunks(&[]).is_empty());
    }

    #[test]
    fn every_message_carries_identity_metadata() {
        let service = ScannerServiceImpl::builder().config(ScannerConfig::default()).build();
        let requests = service.requests("a.bin", &vec![0u8; 9000], true);
        assert_eq!(requests.len(), 2);
        for request in &requests {
            let attributes = request.attributes.as_ref().unwrap();
            assert_eq!(attributes.filename, "a.bin");
            assert_eq!(attributes.metadata["client_name"], "fileshot");
            assert!(attributes.metadata.contains_key("client_version"));
            assert!(!request.request.as_ref().unwrap().gatekeeper);
        }
    }
}
