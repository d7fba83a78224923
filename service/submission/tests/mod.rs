use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use domain_submission::exception::SubmissionException;
use domain_submission::mock::{
    MockArchiveUnpackService, MockObjectStoreService, MockReputationService, MockScannerService,
    MockSubmissionRepo,
};
use domain_submission::model::entity::{Submission, SubmissionKind, User};
use domain_submission::model::vo::{
    sentinel, NamedBytes, ScanRecord, StoredObject, SubmissionRequest, SubmissionSource,
};
use domain_submission::service::SubmitService;
use service_submission::SubmitServiceImpl;

fn record(value: serde_json::Value) -> ScanRecord {
    serde_json::from_value(value).unwrap()
}

fn user() -> User {
    User {
        id: 7,
        user_cn: "analyst".to_owned(),
        first_name: "Ann".to_owned(),
        last_name: "Alyst".to_owned(),
        last_login: None,
        login_count: 1,
        files_submitted: 0,
    }
}

fn upload_request(name: &str, bytes: &[u8]) -> SubmissionRequest {
    SubmissionRequest {
        source: SubmissionSource::File {
            name: name.to_owned(),
            bytes: bytes.to_vec(),
        },
        description: "test submission".to_owned(),
        password: None,
        submitted_from_ip: "10.0.0.1".to_owned(),
        submitted_from_client: "fileshot-webapp".to_owned(),
        bypass_cache: false,
    }
}

/// Three records with distinct MIME priorities and a lookup budget of one:
/// only the executable gets a real lookup, the rest are marked as over
/// budget.
#[tokio::test]
async fn lookup_budget_is_spent_in_priority_order() {
    let records = vec![
        record(serde_json::json!({
            "file": {"flavors": {"mime": ["text/plain"]}},
            "scan": {"hash": {"sha256": "sha-txt"}}
        })),
        record(serde_json::json!({
            "file": {"flavors": {"mime": ["application/x-dosexec"]}},
            "scan": {"hash": {"sha256": "sha-exe"}}
        })),
        record(serde_json::json!({
            "file": {"flavors": {"mime": ["image/png"]}},
            "scan": {"hash": {"sha256": "sha-png"}}
        })),
    ];

    let mut scanner = MockScannerService::new();
    scanner.expect_scan().return_once(move |_, _, _, _| Ok(records));

    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(true);
    reputation
        .expect_lookup_positives()
        .withf(|hash| hash == "sha-exe")
        .times(1)
        .returning(|_| 9);

    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(false);

    let mut repo = MockSubmissionRepo::new();
    repo.expect_create()
        .withf(|submission: &Submission| {
            let vt: Vec<i64> = submission
                .raw_response
                .iter()
                .map(|r| r.enrichment.as_ref().unwrap().virustotal)
                .collect();
            vt == [sentinel::BUDGET_EXCEEDED, 9, sentinel::BUDGET_EXCEEDED]
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 1);
    let receipt = service
        .submit(upload_request("a.bin", b"payload"), &user(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.meta.vt_positives.len(), 1);
    assert_eq!(receipt.meta.vt_positives[0].sha256, "sha-exe");
    assert_eq!(receipt.meta.vt_positives[0].positives, 9);
}

/// A record with no sha256 consumes budget but is marked as not
/// attempted instead of producing a lookup.
#[tokio::test]
async fn missing_sha256_is_not_attempted() {
    let records = vec![record(serde_json::json!({
        "file": {"flavors": {"mime": ["text/plain"]}}
    }))];

    let mut scanner = MockScannerService::new();
    scanner.expect_scan().return_once(move |_, _, _, _| Ok(records));

    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(true);
    reputation.expect_lookup_positives().times(0);

    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(false);

    let mut repo = MockSubmissionRepo::new();
    repo.expect_create()
        .withf(|submission: &Submission| {
            submission.raw_response[0].enrichment.as_ref().unwrap().virustotal
                == sentinel::NOT_ATTEMPTED
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    service
        .submit(upload_request("a.txt", b"x"), &user(), CancellationToken::new())
        .await
        .unwrap();
}

/// With reputation disabled no record carries an enrichment at all, as
/// opposed to carrying an error sentinel.
#[tokio::test]
async fn disabled_reputation_leaves_records_unenriched() {
    let records = vec![record(serde_json::json!({
        "scan": {"hash": {"sha256": "sha-a"}}
    }))];

    let mut scanner = MockScannerService::new();
    scanner.expect_scan().return_once(move |_, _, _, _| Ok(records));

    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(false);
    reputation.expect_lookup_positives().times(0);

    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(false);

    let mut repo = MockSubmissionRepo::new();
    repo.expect_create()
        .withf(|submission: &Submission| {
            submission.raw_response.iter().all(|r| r.enrichment.is_none())
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    service
        .submit(upload_request("a.txt", b"x"), &user(), CancellationToken::new())
        .await
        .unwrap();
}

/// Scanner failure aborts the submission before anything is persisted.
#[tokio::test]
async fn scan_failure_persists_nothing() {
    let mut scanner = MockScannerService::new();
    scanner.expect_scan().return_once(|file_name, _, _, _| {
        Err(SubmissionException::Scan {
            file_name: file_name.to_owned(),
            source: anyhow::anyhow!("stream reset"),
        })
    });

    let mut reputation = MockReputationService::new();
    reputation.expect_lookup_positives().times(0);
    let mut object_store = MockObjectStoreService::new();
    object_store.expect_upload().times(0);
    let mut repo = MockSubmissionRepo::new();
    repo.expect_create().times(0);

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service
        .submit(upload_request("a.bin", b"x"), &user(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SubmissionException::Scan { .. })));
}

/// A failed unpack rejects the submission before the Scanner is
/// contacted.
#[tokio::test]
async fn unpack_failure_never_reaches_the_scanner() {
    let mut scanner = MockScannerService::new();
    scanner.expect_scan().times(0);
    let reputation = MockReputationService::new();
    let object_store = MockObjectStoreService::new();
    let mut repo = MockSubmissionRepo::new();
    repo.expect_create().times(0);

    let mut unpacker = MockArchiveUnpackService::new();
    unpacker
        .expect_unpack()
        .return_once(|_, _| {
            Err(SubmissionException::Unpack {
                reason: "invalid password".to_owned(),
            })
        });

    let mut request = upload_request("a.zip", b"PK...");
    request.password = Some("wrong".to_owned());

    let service = service(scanner, reputation, object_store, unpacker, repo, 30);
    let result = service.submit(request, &user(), CancellationToken::new()).await;
    assert!(matches!(result, Err(SubmissionException::Unpack { .. })));
}

/// An archive upload produces one row aggregating every member's
/// records, with the row keyed by the first record's correlation id.
#[tokio::test]
async fn archive_members_aggregate_into_one_row() {
    let first = vec![record(serde_json::json!({
        "request": {"id": "corr-123"},
        "scan": {"hash": {"sha256": "sha-a", "elapsed": 0.01}}
    }))];
    let second = vec![record(serde_json::json!({
        "scan": {"hash": {"sha256": "sha-b"}}
    }))];

    let mut scanner = MockScannerService::new();
    let mut batches = vec![second, first];
    scanner
        .expect_scan()
        .times(2)
        .returning(move |_, _, _, _| Ok(batches.pop().unwrap_or_default()));

    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(false);
    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(false);

    let mut unpacker = MockArchiveUnpackService::new();
    unpacker.expect_unpack().return_once(|_, _| {
        Ok(vec![
            NamedBytes { name: "inner-1".to_owned(), bytes: b"aa".to_vec() },
            NamedBytes { name: "inner-2".to_owned(), bytes: b"bb".to_vec() },
        ])
    });

    let mut repo = MockSubmissionRepo::new();
    repo.expect_create()
        .withf(|submission: &Submission| {
            submission.file_id == "corr-123"
                && submission.files_seen == 2
                && submission.kind == SubmissionKind::Upload
                && submission.hashes.iter().all(|(k, _)| k != "elapsed")
                && submission.hashes.iter().any(|(k, v)| k == "sha256" && v == "sha-a")
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut request = upload_request("bundle.zip", b"PK...");
    request.password = Some("infected".to_owned());

    let service = service(scanner, reputation, object_store, unpacker, repo, 30);
    let receipt = service.submit(request, &user(), CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.file_id, "corr-123");
    assert_eq!(receipt.response.len(), 2);
}

/// Object storage failure degrades the submission rather than failing
/// it: the row is still written, just without a stored copy.
#[tokio::test]
async fn storage_failure_degrades_to_no_stored_copy() {
    let records = vec![record(serde_json::json!({
        "request": {"id": "corr-9"}
    }))];

    let mut scanner = MockScannerService::new();
    scanner.expect_scan().return_once(move |_, _, _, _| Ok(records));
    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(false);

    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(true);
    object_store
        .expect_upload()
        .times(1)
        .returning(|_, _, _| Err(anyhow::anyhow!("bucket unreachable")));

    let mut repo = MockSubmissionRepo::new();
    repo.expect_create()
        .withf(|submission: &Submission| submission.object_key.is_none())
        .times(1)
        .returning(|_| Ok(()));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    service
        .submit(upload_request("a.bin", b"x"), &user(), CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_filename_is_rejected() {
    let scanner = MockScannerService::new();
    let reputation = MockReputationService::new();
    let object_store = MockObjectStoreService::new();
    let repo = MockSubmissionRepo::new();

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service
        .submit(upload_request("", b"x"), &user(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SubmissionException::Validation { .. })));
}

#[tokio::test]
async fn resubmit_unknown_file_id_is_not_found() {
    let scanner = MockScannerService::new();
    let reputation = MockReputationService::new();
    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(true);
    let mut repo = MockSubmissionRepo::new();
    repo.expect_get_by_file_id().return_once(|_| Ok(None));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service
        .resubmit("missing", &user(), "10.0.0.1", "webapp", CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SubmissionException::NotFound { .. })));
}

#[tokio::test]
async fn resubmit_without_stored_copy_is_rejected() {
    let scanner = MockScannerService::new();
    let reputation = MockReputationService::new();
    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(true);
    object_store.expect_download().times(0);
    let mut repo = MockSubmissionRepo::new();
    repo.expect_get_by_file_id()
        .return_once(|file_id| Ok(Some(bare_submission(file_id, None, None))));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service
        .resubmit("abc", &user(), "10.0.0.1", "webapp", CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SubmissionException::Validation { .. })));
}

#[tokio::test]
async fn resubmit_expired_copy_is_gone() {
    let scanner = MockScannerService::new();
    let reputation = MockReputationService::new();
    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(true);
    object_store.expect_download().times(0);
    let mut repo = MockSubmissionRepo::new();
    repo.expect_get_by_file_id().return_once(|file_id| {
        Ok(Some(bare_submission(
            file_id,
            Some("submissions/abc/a.bin".to_owned()),
            Some(chrono::Utc::now() - chrono::Duration::days(1)),
        )))
    });

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service
        .resubmit("abc", &user(), "10.0.0.1", "webapp", CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SubmissionException::Expired { .. })));
}

/// A resubmission replays the stored bytes with the Scanner cache
/// bypassed and records the canonical description.
#[tokio::test]
async fn resubmit_replays_with_cache_bypassed() {
    let records = vec![record(serde_json::json!({
        "request": {"id": "corr-new"}
    }))];

    let mut scanner = MockScannerService::new();
    scanner
        .expect_scan()
        .withf(|file_name, bytes, bypass_cache, _| {
            file_name == "a.bin" && bytes == b"stored" && *bypass_cache
        })
        .return_once(move |_, _, _, _| Ok(records));

    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(false);

    let mut object_store = MockObjectStoreService::new();
    object_store.expect_enabled().return_const(true);
    object_store
        .expect_download()
        .withf(|key| key == "submissions/abc/a.bin")
        .return_once(|_| {
            Ok(NamedBytes { name: "a.bin".to_owned(), bytes: b"stored".to_vec() })
        });
    object_store.expect_upload().times(1).returning(|file_id, file_name, _| {
        Ok(StoredObject {
            key: format!("submissions/{file_id}/{file_name}"),
            expires_at: chrono::Utc::now() + chrono::Duration::days(30),
        })
    });

    let mut repo = MockSubmissionRepo::new();
    repo.expect_get_by_file_id().return_once(|file_id| {
        Ok(Some(bare_submission(
            file_id,
            Some("submissions/abc/a.bin".to_owned()),
            None,
        )))
    });
    repo.expect_create()
        .withf(|submission: &Submission| {
            submission.kind == SubmissionKind::Resubmission
                && submission.submitted_description == "Resubmission of /submissions/abc"
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let receipt = service
        .resubmit("abc", &user(), "10.0.0.1", "webapp", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(receipt.file_id, "corr-new");
}

/// A hash submission requires a configured reputation backend.
#[tokio::test]
async fn hash_submission_requires_reputation() {
    let scanner = MockScannerService::new();
    let mut reputation = MockReputationService::new();
    reputation.expect_enabled().return_const(false);
    reputation.expect_fetch_bundle().times(0);
    let object_store = MockObjectStoreService::new();
    let repo = MockSubmissionRepo::new();

    let mut request = upload_request("unused", b"");
    request.source = SubmissionSource::ReputationHash("d".repeat(64));

    let service = service(scanner, reputation, object_store, no_unpacker(), repo, 30);
    let result = service.submit(request, &user(), CancellationToken::new()).await;
    assert!(matches!(result, Err(SubmissionException::Validation { .. })));
}

fn bare_submission(
    file_id: &str,
    object_key: Option<String>,
    object_expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Submission {
    Submission {
        id: uuid::Uuid::new_v4(),
        file_id: file_id.to_owned(),
        file_name: "a.bin".to_owned(),
        file_size: 6,
        raw_response: vec![],
        mime_types: vec![],
        yara_hits: vec![],
        scanners_run: vec![],
        hashes: vec![],
        files_seen: 1,
        insights: vec![],
        iocs: vec![],
        highest_positives: 0,
        highest_positives_sha256: None,
        kind: SubmissionKind::Upload,
        submitted_from_ip: "10.0.0.1".to_owned(),
        submitted_from_client: "webapp".to_owned(),
        submitted_by_user_id: 7,
        submitted_description: "original".to_owned(),
        submitted_at: chrono::Utc::now(),
        processed_at: None,
        object_key,
        object_expires_at,
    }
}

fn no_unpacker() -> MockArchiveUnpackService {
    let mut unpacker = MockArchiveUnpackService::new();
    unpacker.expect_unpack().times(0);
    unpacker
}

fn service(
    scanner: MockScannerService,
    reputation: MockReputationService,
    object_store: MockObjectStoreService,
    unpacker: MockArchiveUnpackService,
    repo: MockSubmissionRepo,
    max_lookups: usize,
) -> SubmitServiceImpl {
    SubmitServiceImpl::builder()
        .scanner(Arc::new(scanner))
        .reputation(Arc::new(reputation))
        .object_store(Arc::new(object_store))
        .unpacker(Arc::new(unpacker))
        .submission_repo(Arc::new(repo))
        .max_lookups(max_lookups)
        .build()
}
