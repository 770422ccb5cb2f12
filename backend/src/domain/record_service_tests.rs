//! Tests for the record service.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use pagination::PageRequest;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::domain::ports::{MockAttachmentStore, MockRecordRepository};
use crate::domain::{
    AuthorUid, Claims, EmailEntry, ErrorCode, PhoneNumber, PhoneNumberPayload, RecordId,
    StudentPayload,
};

const SECRET: &[u8] = b"record-service-secret";

struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0)
        .single()
        .expect("valid fixture timestamp")
}

#[fixture]
fn verifier() -> Arc<TokenVerifier> {
    Arc::new(TokenVerifier::new(SECRET.to_vec()).expect("secret is non-empty"))
}

fn claims_for(uid: &str) -> Claims {
    match json!({"uid": uid, "email": format!("{uid}@example.com")}) {
        serde_json::Value::Object(map) => Claims::new(map),
        _ => unreachable!("literal is an object"),
    }
}

fn token_for(verifier: &TokenVerifier, uid: &str) -> BearerToken {
    BearerToken::new(verifier.sign(&claims_for(uid)))
}

fn author(uid: &str) -> Author {
    Author::from_claims(claims_for(uid)).expect("fixture claims carry a uid")
}

fn uid(value: &str) -> AuthorUid {
    author(value).uid().clone()
}

fn stored_record(id: i64, owner: &str) -> Record {
    let created_at = fixture_now() - TimeDelta::days(1);
    Record {
        id: RecordId::new(id),
        student: Student {
            name: "Jane".to_owned(),
            emails: vec![EmailEntry {
                email: "jane@example.com".to_owned(),
            }],
            numbers: vec![
                PhoneNumber {
                    number: "+1555".to_owned(),
                    country_code: "+1".to_owned(),
                    verified: None,
                },
                PhoneNumber {
                    number: "+4420".to_owned(),
                    country_code: "+44".to_owned(),
                    verified: None,
                },
            ],
        },
        author: author(owner),
        attachment: None,
        details: None,
        audit_log: Vec::new(),
        revision: 1,
        created_at,
        updated_at: created_at,
    }
}

fn service(
    repo: MockRecordRepository,
    attachments: MockAttachmentStore,
    verifier: Arc<TokenVerifier>,
) -> RecordService<MockRecordRepository, MockAttachmentStore> {
    RecordService::new(
        Arc::new(repo),
        Arc::new(attachments),
        verifier,
        Arc::new(FixtureClock {
            utc_now: fixture_now(),
        }),
    )
}

fn student_payload() -> StudentPayload {
    StudentPayload {
        name: Some("Jane".to_owned()),
        emails: Vec::new(),
        numbers: vec![PhoneNumberPayload {
            number: Some("+1555".to_owned()),
            country_code: Some("+1".to_owned()),
            verified: None,
        }],
    }
}

fn update_request(token: BearerToken, locator: Option<RecordLocator>) -> UpdateRecordRequest {
    UpdateRecordRequest {
        token,
        locator,
        verified: Vec::new(),
        comment: None,
        attachment: None,
    }
}

fn verification(number: &str, verified: Option<bool>) -> NumberVerification {
    NumberVerification {
        number: number.to_owned(),
        verified,
    }
}

fn detail_code(error: &Error) -> Option<&str> {
    error
        .details()
        .and_then(|details| details.get("code"))
        .and_then(serde_json::Value::as_str)
}

#[rstest]
#[tokio::test]
async fn create_record_stores_validated_student_and_claims(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_create()
        .withf(|new| {
            new.author.uid().as_str() == "u1"
                && new.author.claims().get("email") == Some(&json!("u1@example.com"))
                && new.student.has_number("+1555")
                && new.created_at == fixture_now()
        })
        .times(1)
        .returning(|new| {
            Ok(Record {
                id: RecordId::new(42),
                student: new.student.clone(),
                author: new.author.clone(),
                attachment: None,
                details: None,
                audit_log: Vec::new(),
                revision: 1,
                created_at: new.created_at,
                updated_at: new.created_at,
            })
        });

    let token = token_for(&verifier, "u1");
    let response = service(repo, MockAttachmentStore::new(), verifier)
        .create_record(CreateRecordRequest {
            token,
            student: student_payload(),
        })
        .await
        .expect("create succeeds");

    assert_eq!(response.record.id, RecordId::new(42));
    assert_eq!(response.record.revision, 1);
}

#[rstest]
#[tokio::test]
async fn create_record_rejects_tokens_from_other_issuers(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_create().times(0);

    let forger = TokenVerifier::new(b"forged".to_vec()).expect("secret is non-empty");
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .create_record(CreateRecordRequest {
            token: token_for(&forger, "u1"),
            student: student_payload(),
        })
        .await
        .expect_err("forged token is rejected");

    assert_eq!(error.code(), ErrorCode::Unauthorized);
    assert_eq!(detail_code(&error), Some("invalid_signature"));
}

#[rstest]
#[tokio::test]
async fn create_record_requires_uid_claim(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_create().times(0);

    let token = BearerToken::new(verifier.sign(&Claims::new(serde_json::Map::new())));
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .create_record(CreateRecordRequest {
            token,
            student: student_payload(),
        })
        .await
        .expect_err("uid is required");

    assert_eq!(error.code(), ErrorCode::Unauthorized);
    assert_eq!(detail_code(&error), Some("missing_uid"));
}

#[rstest]
#[tokio::test]
async fn create_record_rejects_invalid_student(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_create().times(0);

    let mut student = student_payload();
    student.name = None;
    let token = token_for(&verifier, "u1");
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .create_record(CreateRecordRequest { token, student })
        .await
        .expect_err("name is required");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        error.details().and_then(|details| details.get("field")),
        Some(&json!("student.name"))
    );
}

#[rstest]
#[tokio::test]
async fn create_record_maps_connection_error(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_create()
        .times(1)
        .return_once(|_| Err(RecordRepositoryError::connection("pool exhausted")));

    let token = token_for(&verifier, "u1");
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .create_record(CreateRecordRequest {
            token,
            student: student_payload(),
        })
        .await
        .expect_err("store is down");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn list_records_scopes_to_caller_and_reports_total(verifier: Arc<TokenVerifier>) {
    let page = PageRequest::new(2, 1).expect("valid page");
    let mut repo = MockRecordRepository::new();
    repo.expect_list_by_author()
        .withf(move |filter, requested| {
            filter.author.as_str() == "u1"
                && filter.number.as_deref() == Some("+1555")
                && *requested == page
        })
        .times(1)
        .returning(|_, _| Ok(vec![stored_record(7, "u1")]));
    repo.expect_count_by_author()
        .withf(|filter| filter.author.as_str() == "u1")
        .times(1)
        .returning(|_| Ok(3));

    let token = token_for(&verifier, "u1");
    let response = service(repo, MockAttachmentStore::new(), verifier)
        .list_records(ListRecordsRequest {
            token,
            page: Some("2".to_owned()),
            limit: Some("1".to_owned()),
            number: Some("+1555".to_owned()),
        })
        .await
        .expect("list succeeds");

    assert_eq!(response.records.page, 2);
    assert_eq!(response.records.limit, 1);
    assert_eq!(response.records.total, 3);
    assert_eq!(response.records.data.len(), 1);
}

#[rstest]
#[tokio::test]
async fn list_records_ignores_blank_number_filter(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_list_by_author()
        .withf(|filter, _| filter.number.is_none())
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    repo.expect_count_by_author().times(1).returning(|_| Ok(0));

    let token = token_for(&verifier, "u1");
    let response = service(repo, MockAttachmentStore::new(), verifier)
        .list_records(ListRecordsRequest {
            token,
            page: None,
            limit: None,
            number: Some("   ".to_owned()),
        })
        .await
        .expect("list succeeds");

    assert!(response.records.data.is_empty());
    assert_eq!(response.records.total, 0);
}

#[rstest]
#[tokio::test]
async fn list_records_requires_a_valid_token(verifier: Arc<TokenVerifier>) {
    let repo = MockRecordRepository::new();
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .list_records(ListRecordsRequest {
            token: BearerToken::new("garbage"),
            page: Some("not-a-number".to_owned()),
            limit: None,
            number: None,
        })
        .await
        .expect_err("token is malformed");

    assert_eq!(error.code(), ErrorCode::Unauthorized);
    assert_eq!(detail_code(&error), Some("malformed_token"));
}

#[rstest]
#[case(Some("abc"), None, "page")]
#[case(None, Some("0"), "limit")]
#[case(Some("4294967295"), Some("4294967295"), "page")]
#[tokio::test]
async fn list_records_rejects_bad_page_parameters(
    verifier: Arc<TokenVerifier>,
    #[case] page: Option<&str>,
    #[case] limit: Option<&str>,
    #[case] field: &str,
) {
    let mut repo = MockRecordRepository::new();
    repo.expect_list_by_author().times(0);

    let token = token_for(&verifier, "u1");
    let error = service(repo, MockAttachmentStore::new(), verifier)
        .list_records(ListRecordsRequest {
            token,
            page: page.map(str::to_owned),
            limit: limit.map(str::to_owned),
            number: None,
        })
        .await
        .expect_err("page parameters are invalid");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(detail_code(&error), Some("invalid_page"));
    assert_eq!(
        error.details().and_then(|details| details.get("field")),
        Some(&json!(field))
    );
}

#[rstest]
#[tokio::test]
async fn update_by_id_merges_verification_and_bumps_revision(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .withf(|id| *id == RecordId::new(7))
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save()
        .withf(|record, expected| {
            *expected == 1
                && record.revision == 2
                && record.updated_at == fixture_now()
                && record.audit_log.len() == 1
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.verified = vec![verification("+1555", Some(true))];
    request.comment = Some("called back".to_owned());

    let record = service(repo, MockAttachmentStore::new(), verifier)
        .update_record(request)
        .await
        .expect("update succeeds")
        .record;

    assert_eq!(
        record.student.numbers.first().and_then(|n| n.verified),
        Some(true)
    );
    assert_eq!(record.student.numbers.get(1).map(|n| n.verified), Some(None));
    assert_eq!(record.details, Some(RecordDetails::walkin("called back")));
    let entry = record.audit_log.first().expect("audit entry appended");
    assert_eq!(entry.author, uid("u1"));
    assert_eq!(entry.comment.as_deref(), Some("called back"));
    assert_eq!(entry.verified, vec![verification("+1555", Some(true))]);
    assert_eq!(entry.created_at, fixture_now());
}

#[rstest]
#[tokio::test]
async fn update_without_comment_keeps_existing_details(verifier: Arc<TokenVerifier>) {
    let mut existing = stored_record(7, "u1");
    existing.details = Some(RecordDetails::walkin("first visit"));
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(Some(existing)));
    repo.expect_save().times(1).returning(|_, _| Ok(()));

    let record = service(repo, MockAttachmentStore::new(), verifier.clone())
        .update_record(update_request(
            token_for(&verifier, "u1"),
            Some(RecordLocator::Id(RecordId::new(7))),
        ))
        .await
        .expect("update succeeds")
        .record;

    assert_eq!(record.details, Some(RecordDetails::walkin("first visit")));
}

#[rstest]
#[tokio::test]
async fn update_by_another_author_is_forbidden(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_latest_by_number()
        .withf(|number| number == "+1555")
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save().times(0);
    let mut attachments = MockAttachmentStore::new();
    attachments.expect_store().times(0);

    let mut request = update_request(
        token_for(&verifier, "u2"),
        Some(RecordLocator::Number("+1555".to_owned())),
    );
    request.verified = vec![verification("+1555", Some(true))];

    let error = service(repo, attachments, verifier)
        .update_record(request)
        .await
        .expect_err("not the owner");

    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn update_resolves_record_from_verified_entries_in_order(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_latest_by_number()
        .withf(|number| number == "+0000")
        .times(1)
        .returning(|_| Ok(None));
    repo.expect_find_latest_by_number()
        .withf(|number| number == "+4420")
        .times(1)
        .returning(|_| Ok(Some(stored_record(9, "u1"))));
    repo.expect_save()
        .withf(|record, _| record.id == RecordId::new(9))
        .times(1)
        .returning(|_, _| Ok(()));

    let mut request = update_request(token_for(&verifier, "u1"), None);
    request.verified = vec![
        verification("+0000", Some(true)),
        verification("+4420", Some(false)),
    ];

    let record = service(repo, MockAttachmentStore::new(), verifier)
        .update_record(request)
        .await
        .expect("update succeeds")
        .record;

    assert_eq!(
        record.student.numbers.get(1).and_then(|n| n.verified),
        Some(false)
    );
}

#[rstest]
#[tokio::test]
async fn update_without_any_locator_is_invalid(verifier: Arc<TokenVerifier>) {
    let repo = MockRecordRepository::new();
    let error = service(repo, MockAttachmentStore::new(), verifier.clone())
        .update_record(update_request(token_for(&verifier, "u1"), None))
        .await
        .expect_err("nothing identifies the record");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(detail_code(&error), Some("missing_locator"));
}

#[rstest]
#[tokio::test]
async fn update_of_unknown_record_is_not_found(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id().times(1).returning(|_| Ok(None));
    repo.expect_save().times(0);

    let error = service(repo, MockAttachmentStore::new(), verifier.clone())
        .update_record(update_request(
            token_for(&verifier, "u1"),
            Some(RecordLocator::Id(RecordId::new(404))),
        ))
        .await
        .expect_err("record is missing");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn update_resolves_before_authenticating(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save().times(0);

    let error = service(repo, MockAttachmentStore::new(), verifier)
        .update_record(update_request(
            BearerToken::new("not.a.token"),
            Some(RecordLocator::Id(RecordId::new(7))),
        ))
        .await
        .expect_err("token is rejected");

    assert_eq!(error.code(), ErrorCode::Unauthorized);
}

#[rstest]
#[tokio::test]
async fn update_rejects_blank_verification_numbers(verifier: Arc<TokenVerifier>) {
    let repo = MockRecordRepository::new();
    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.verified = vec![verification("", Some(true))];

    let error = service(repo, MockAttachmentStore::new(), verifier)
        .update_record(request)
        .await
        .expect_err("blank number");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn concurrent_save_surfaces_as_conflict(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save()
        .times(1)
        .returning(|_, _| Err(RecordRepositoryError::revision_mismatch(1_u32, 2_u32)));

    let error = service(repo, MockAttachmentStore::new(), verifier.clone())
        .update_record(update_request(
            token_for(&verifier, "u1"),
            Some(RecordLocator::Id(RecordId::new(7))),
        ))
        .await
        .expect_err("lost the race");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(
        error.details().and_then(|details| details.get("actual_revision")),
        Some(&json!(2))
    );
}

#[rstest]
#[tokio::test]
async fn update_stores_attachment_and_references_it(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save()
        .withf(|record, _| {
            record.attachment.as_ref().map(AttachmentRef::as_str) == Some("media/form.pdf")
        })
        .times(1)
        .returning(|_, _| Ok(()));
    let mut attachments = MockAttachmentStore::new();
    attachments
        .expect_store()
        .withf(|name, contents| name == "form.pdf" && contents == b"%PDF")
        .times(1)
        .returning(|_, _| Ok(AttachmentRef::new("media/form.pdf")));

    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.attachment = Some(AttachmentUpload {
        file_name: "form.pdf".to_owned(),
        contents: b"%PDF".to_vec(),
    });

    let record = service(repo, attachments, verifier)
        .update_record(request)
        .await
        .expect("update succeeds")
        .record;

    let entry = record.audit_log.first().expect("audit entry appended");
    assert_eq!(
        entry.attachment_ref,
        Some(AttachmentRef::new("media/form.pdf"))
    );
}

#[rstest]
#[tokio::test]
async fn attachment_name_errors_are_invalid_requests(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save().times(0);
    let mut attachments = MockAttachmentStore::new();
    attachments
        .expect_store()
        .times(1)
        .returning(|name, _| Err(AttachmentStoreError::invalid_name(name)));

    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.attachment = Some(AttachmentUpload {
        file_name: "..".to_owned(),
        contents: Vec::new(),
    });

    let error = service(repo, attachments, verifier)
        .update_record(request)
        .await
        .expect_err("name is unusable");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn attachment_write_failures_keep_a_stable_code(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save().times(0);
    let mut attachments = MockAttachmentStore::new();
    attachments
        .expect_store()
        .times(1)
        .returning(|_, _| Err(AttachmentStoreError::write("disk full")));

    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.attachment = Some(AttachmentUpload {
        file_name: "form.pdf".to_owned(),
        contents: b"%PDF".to_vec(),
    });

    let error = service(repo, attachments, verifier)
        .update_record(request)
        .await
        .expect_err("write fails");

    assert_eq!(error.code(), ErrorCode::InternalError);
    assert_eq!(detail_code(&error), Some("attachment_write_failed"));
}

#[rstest]
#[tokio::test]
async fn verification_of_unheld_number_still_records_the_update(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save()
        .withf(|record, expected| {
            *expected == 1 && record.student == stored_record(7, "u1").student
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let mut request = update_request(
        token_for(&verifier, "u1"),
        Some(RecordLocator::Id(RecordId::new(7))),
    );
    request.verified = vec![verification("+9999", Some(true))];
    request.comment = Some("wrong number".to_owned());

    let record = service(repo, MockAttachmentStore::new(), verifier)
        .update_record(request)
        .await
        .expect("update succeeds")
        .record;

    assert_eq!(record.student, stored_record(7, "u1").student);
    assert_eq!(record.details, Some(RecordDetails::walkin("wrong number")));
    assert_eq!(record.revision, 2);
    assert_eq!(record.updated_at, fixture_now());
    let entry = record.audit_log.first().expect("audit entry appended");
    assert_eq!(entry.verified, vec![verification("+9999", Some(true))]);
}

#[rstest]
#[tokio::test]
async fn disabled_audit_log_skips_history(verifier: Arc<TokenVerifier>) {
    let mut repo = MockRecordRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_record(7, "u1"))));
    repo.expect_save()
        .withf(|record, _| record.audit_log.is_empty() && record.revision == 2)
        .times(1)
        .returning(|_, _| Ok(()));

    let record = service(repo, MockAttachmentStore::new(), verifier.clone())
        .with_policy(UpdatePolicy { audit_log: false })
        .update_record(update_request(
            token_for(&verifier, "u1"),
            Some(RecordLocator::Id(RecordId::new(7))),
        ))
        .await
        .expect("update succeeds")
        .record;

    assert!(record.audit_log.is_empty());
}
