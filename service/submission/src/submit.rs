use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use domain_submission::exception::{SubmissionException, SubmissionResult};
use domain_submission::model::entity::{Submission, SubmissionDraft, SubmissionKind, User};
use domain_submission::model::vo::{
    sentinel, EnrichedScanRecord, Enrichment, NamedBytes, PositiveLookup, ReceiptMeta, ScanRecord,
    StoredObject, SubmissionReceipt, SubmissionRequest, SubmissionSource,
};
use domain_submission::repository::SubmissionRepo;
use domain_submission::service::{
    ArchiveUnpackService, ObjectStoreService, ReputationService, ScannerService, SubmitService,
};

use crate::insight::derive_insights;
use crate::priority::record_priority;

/// Uploads above this size are rejected before any Scanner round trip.
pub const MAX_UPLOAD_BYTES: usize = 150 * 1024 * 1024;

/// System-wide password for reputation-sourced archive bundles.
pub const BUNDLE_PASSWORD: &str = "infected";

pub fn within_upload_limit(size: usize) -> bool {
    size <= MAX_UPLOAD_BYTES
}

#[derive(TypedBuilder)]
pub struct SubmitServiceImpl {
    scanner: Arc<dyn ScannerService>,
    reputation: Arc<dyn ReputationService>,
    object_store: Arc<dyn ObjectStoreService>,
    unpacker: Arc<dyn ArchiveUnpackService>,
    submission_repo: Arc<dyn SubmissionRepo>,
    /// Reputation lookup budget per submission.
    #[builder(default = 30)]
    max_lookups: usize,
}

struct ResolvedInput {
    kind: SubmissionKind,
    /// Name recorded on the persisted row (and used for the stored copy).
    display_name: String,
    /// Payload as received, kept for the optional stored copy.
    original: Vec<u8>,
    /// What actually gets scanned: the file itself, or archive members.
    members: Vec<NamedBytes>,
}

#[async_trait]
impl SubmitService for SubmitServiceImpl {
    async fn submit(
        &self,
        request: SubmissionRequest,
        user: &User,
        cancel: CancellationToken,
    ) -> SubmissionResult<SubmissionReceipt> {
        let input = self.resolve_input(&request, cancel.clone()).await?;
        self.run_pipeline(input, &request, user, cancel).await
    }

    async fn resubmit(
        &self,
        file_id: &str,
        user: &User,
        submitted_from_ip: &str,
        submitted_from_client: &str,
        cancel: CancellationToken,
    ) -> SubmissionResult<SubmissionReceipt> {
        if !self.object_store.enabled() {
            return Err(SubmissionException::validation(
                "File resubmission is not enabled.",
            ));
        }
        let original = self
            .submission_repo
            .get_by_file_id(file_id)
            .await?
            .ok_or_else(|| SubmissionException::NotFound {
                file_id: file_id.to_owned(),
            })?;
        let key = original.object_key.as_deref().ok_or_else(|| {
            SubmissionException::validation("The original file was not kept in object storage.")
        })?;
        if let Some(expires_at) = original.object_expires_at {
            if expires_at < Utc::now() {
                return Err(SubmissionException::Expired {
                    file_id: file_id.to_owned(),
                    expired_at: expires_at,
                });
            }
        }
        let stored = self.object_store.download(key).await?;

        let request = SubmissionRequest {
            source: SubmissionSource::File {
                name: stored.name.clone(),
                bytes: vec![],
            },
            description: format!("Resubmission of /submissions/{file_id}"),
            password: None,
            submitted_from_ip: submitted_from_ip.to_owned(),
            submitted_from_client: submitted_from_client.to_owned(),
            bypass_cache: true,
        };
        let input = ResolvedInput {
            kind: SubmissionKind::Resubmission,
            display_name: stored.name.clone(),
            original: stored.bytes.clone(),
            members: vec![stored],
        };
        self.run_pipeline(input, &request, user, cancel).await
    }
}

impl SubmitServiceImpl {
    /// Step 1-3 of the pipeline: validate the source, fetch hash-sourced
    /// bundles, gate the size and unpack password-protected archives. Any
    /// failure here aborts before the Scanner is contacted.
    async fn resolve_input(
        &self,
        request: &SubmissionRequest,
        cancel: CancellationToken,
    ) -> SubmissionResult<ResolvedInput> {
        match &request.source {
            SubmissionSource::File { name, bytes } => {
                if name.is_empty() {
                    return Err(SubmissionException::validation(
                        "Submitted filename is empty.",
                    ));
                }
                if !within_upload_limit(bytes.len()) {
                    return Err(SubmissionException::validation(format!(
                        "File submitted cannot be larger than 150MB. Actual size: {} bytes.",
                        bytes.len()
                    )));
                }
                let members = match request.password.as_deref().filter(|p| !p.is_empty()) {
                    Some(password) => self.unpacker.unpack(bytes, password)?,
                    None => vec![NamedBytes {
                        name: name.clone(),
                        bytes: bytes.clone(),
                    }],
                };
                Ok(ResolvedInput {
                    kind: SubmissionKind::Upload,
                    display_name: name.clone(),
                    original: bytes.clone(),
                    members,
                })
            }
            SubmissionSource::ReputationHash(hash) => {
                if hash.is_empty() {
                    return Err(SubmissionException::validation("Submitted hash is empty."));
                }
                if !self.reputation.enabled() {
                    return Err(SubmissionException::validation(
                        "No reputation API key has been configured.",
                    ));
                }
                let bundle = self
                    .reputation
                    .fetch_bundle(&[hash.clone()], BUNDLE_PASSWORD, cancel)
                    .await?;
                let members = self.unpacker.unpack(&bundle, BUNDLE_PASSWORD)?;
                Ok(ResolvedInput {
                    kind: SubmissionKind::ReputationLookup,
                    display_name: hash.clone(),
                    original: bundle,
                    members,
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        input: ResolvedInput,
        request: &SubmissionRequest,
        user: &User,
        cancel: CancellationToken,
    ) -> SubmissionResult<SubmissionReceipt> {
        let submitted_at = Utc::now();

        // Scan every member independently; one aggregate row backs the
        // whole submission, so the record lists are concatenated in file
        // order. Any Scanner failure aborts the submission.
        let mut records: Vec<ScanRecord> = vec![];
        for member in &input.members {
            let member_records = self
                .scanner
                .scan(&member.name, &member.bytes, request.bypass_cache, cancel.clone())
                .await?;
            records.extend(member_records);
        }
        if records.is_empty() {
            return Err(SubmissionException::Scan {
                file_name: input.display_name,
                source: anyhow::anyhow!("the scanner returned no results"),
            });
        }

        let (enrichments, vt_positives) = self.enrich(&records).await;

        // Derive per-record insights and freeze each record with its
        // enrichment into an immutable value.
        let enriched: Vec<EnrichedScanRecord> = records
            .into_iter()
            .zip(enrichments)
            .map(|(record, enrichment)| {
                let insights =
                    derive_insights(&record, enrichment.as_ref()).into_iter().collect();
                EnrichedScanRecord {
                    record,
                    enrichment,
                    insights,
                }
            })
            .collect();

        let file_id = enriched
            .first()
            .and_then(|r| r.record.correlation_id())
            .unwrap_or_default()
            .to_owned();

        // Best-effort stored copy; the submission succeeds without it.
        let stored_object = self
            .store_original(&file_id, &input.display_name, &input.original)
            .await;

        let submission = Submission::assemble(SubmissionDraft {
            file_name: input.display_name,
            file_size: input.original.len() as i64,
            records: enriched,
            kind: input.kind,
            submitted_from_ip: request.submitted_from_ip.clone(),
            submitted_from_client: request.submitted_from_client.clone(),
            submitted_by_user_id: user.id,
            submitted_description: request.description.clone(),
            submitted_at,
            stored_object,
        });
        self.submission_repo.create(&submission).await?;
        tracing::info!(
            file_id = %submission.file_id,
            files_seen = submission.files_seen,
            user = %user.user_cn,
            "submission persisted"
        );

        Ok(SubmissionReceipt {
            file_id: submission.file_id,
            meta: ReceiptMeta {
                file_size: submission.file_size,
                iocs: submission.iocs,
                vt_positives,
            },
            response: submission.raw_response,
        })
    }

    /// Reputation enrichment under the lookup budget. Records are ranked
    /// by MIME priority; the first `max_lookups` get real lookups, the
    /// rest are marked budget-exceeded. Best-effort by construction:
    /// lookups report errors as a sentinel value, never as failures.
    async fn enrich(
        &self,
        records: &[ScanRecord],
    ) -> (Vec<Option<Enrichment>>, Vec<PositiveLookup>) {
        let mut enrichments: Vec<Option<Enrichment>> = vec![None; records.len()];
        let mut vt_positives = vec![];
        if !self.reputation.enabled() {
            return (enrichments, vt_positives);
        }

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by_key(|&i| record_priority(&records[i]));

        for (rank, &index) in order.iter().enumerate() {
            let virustotal = if rank >= self.max_lookups {
                sentinel::BUDGET_EXCEEDED
            } else {
                match records[index].sha256() {
                    Some(sha256) => {
                        let positives = self.reputation.lookup_positives(&sha256).await;
                        if positives > 0 {
                            vt_positives.push(PositiveLookup { sha256, positives });
                        }
                        positives
                    }
                    None => sentinel::NOT_ATTEMPTED,
                }
            };
            enrichments[index] = Some(Enrichment { virustotal });
        }
        (enrichments, vt_positives)
    }

    async fn store_original(
        &self,
        file_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Option<StoredObject> {
        if !self.object_store.enabled() {
            return None;
        }
        match self.object_store.upload(file_id, file_name, bytes).await {
            Ok(stored) => {
                tracing::info!(key = %stored.key, "stored original file for resubmission");
                Some(stored)
            }
            Err(error) => {
                tracing::warn!(%file_id, %error, "failed to store original file");
                None
            }
        }
    }
}
