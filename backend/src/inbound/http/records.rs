//! Walk-in record HTTP handlers.
//!
//! ```text
//! POST /api/v1/records
//! GET  /api/v1/records?page=&limit=&number=
//! POST /api/v1/records/records-data?id=&number=
//! ```
//!
//! The update endpoint accepts `multipart/form-data` (with an optional
//! `record` file part) or a plain JSON body. Both forms end up in the same
//! domain request.

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::guard::GuardContext;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpResponse, get, post, web};
use futures_util::TryStreamExt;
use pagination::Paginated;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::ports::{
    AttachmentUpload, CreateRecordRequest, ListRecordsRequest, UpdateRecordRequest,
};
use crate::domain::{
    AuditEntry, EmailPayload, Error, NumberVerification, PhoneNumber, PhoneNumberPayload, Record,
    RecordDetails, RecordLocator, StudentPayload,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::BearerAuth;
use crate::inbound::http::error::{json_config, query_config};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, invalid_json_error, invalid_text_error, missing_file_name_error, non_blank,
    parse_record_id, too_large_error,
};

/// Confirmation message returned by the create endpoint.
pub const CREATED_MESSAGE: &str = "Record created successfully";

/// Confirmation message returned by the update endpoint.
pub const UPDATED_MESSAGE: &str = "Record updated successfully";

/// Largest accepted multipart text field.
pub const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

const ATTACHMENT_FIELD: &str = "record";

/// Email entry inside a student document.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EmailBody {
    pub email: Option<String>,
}

/// Phone number entry inside a student document.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PhoneNumberBody {
    pub number: Option<String>,
    pub country_code: Option<String>,
    pub verified: Option<bool>,
}

/// Student document as submitted by clients.
///
/// The singular `email` and `number` keys are accepted as aliases.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StudentBody {
    pub name: Option<String>,
    #[serde(default, alias = "email")]
    pub emails: Vec<EmailBody>,
    #[serde(default, alias = "number")]
    pub numbers: Vec<PhoneNumberBody>,
}

impl From<StudentBody> for StudentPayload {
    fn from(value: StudentBody) -> Self {
        Self {
            name: value.name,
            emails: value
                .emails
                .into_iter()
                .map(|entry| EmailPayload { email: entry.email })
                .collect(),
            numbers: value
                .numbers
                .into_iter()
                .map(|entry| PhoneNumberPayload {
                    number: entry.number,
                    country_code: entry.country_code,
                    verified: entry.verified,
                })
                .collect(),
        }
    }
}

/// Request payload for creating a record.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateRecordRequestBody {
    pub student: StudentBody,
}

/// One verification state to merge into the record.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct VerificationBody {
    pub number: String,
    #[serde(default)]
    pub verified: Option<bool>,
}

impl From<VerificationBody> for NumberVerification {
    fn from(value: VerificationBody) -> Self {
        Self {
            number: value.number,
            verified: value.verified,
        }
    }
}

/// JSON form of the update request.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateRecordRequestBody {
    #[serde(default)]
    pub verified: Vec<VerificationBody>,
    pub comment: Option<String>,
    pub id: Option<String>,
    pub number: Option<String>,
}

/// Multipart form of the update request.
#[derive(Debug, ToSchema)]
pub struct UpdateRecordMultipartBody {
    /// JSON array of `{ "number", "verified" }` objects.
    pub verified: Option<String>,
    pub comment: Option<String>,
    pub id: Option<String>,
    pub number: Option<String>,
    /// File to attach to the record.
    #[schema(value_type = Option<String>, format = Binary)]
    pub record: Option<Vec<u8>>,
}

/// Query string accepted by the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRecordsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub number: Option<String>,
}

/// Query string accepted by the update endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecordQuery {
    pub id: Option<String>,
    pub number: Option<String>,
}

/// Phone number as stored on a record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PhoneNumberResponseBody {
    pub number: String,
    pub country_code: String,
    pub verified: Option<bool>,
}

impl From<PhoneNumber> for PhoneNumberResponseBody {
    fn from(value: PhoneNumber) -> Self {
        Self {
            number: value.number,
            country_code: value.country_code,
            verified: value.verified,
        }
    }
}

/// Student document as stored on a record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentResponseBody {
    pub name: String,
    pub emails: Vec<EmailBody>,
    pub numbers: Vec<PhoneNumberResponseBody>,
}

/// Free-text details attached by the last update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordDetailsBody {
    pub comment: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<RecordDetails> for RecordDetailsBody {
    fn from(value: RecordDetails) -> Self {
        Self {
            comment: value.comment,
            kind: value.kind,
        }
    }
}

/// One entry of a record's update history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntryBody {
    pub verified: Vec<VerificationBody>,
    pub comment: Option<String>,
    pub attachment_ref: Option<String>,
    #[schema(format = "date-time")]
    pub created_at: String,
    pub author: String,
}

impl From<AuditEntry> for AuditEntryBody {
    fn from(value: AuditEntry) -> Self {
        Self {
            verified: value
                .verified
                .into_iter()
                .map(|entry| VerificationBody {
                    number: entry.number,
                    verified: entry.verified,
                })
                .collect(),
            comment: value.comment,
            attachment_ref: value.attachment_ref.map(|stored| stored.as_str().to_owned()),
            created_at: value.created_at.to_rfc3339(),
            author: value.author.as_str().to_owned(),
        }
    }
}

/// Record representation returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordBody {
    pub id: i64,
    pub student: StudentResponseBody,
    /// Claims of the staff member who created the record.
    #[schema(value_type = Object)]
    pub author: serde_json::Map<String, serde_json::Value>,
    pub attachment: Option<String>,
    pub details: Option<RecordDetailsBody>,
    pub audit_log: Vec<AuditEntryBody>,
    pub revision: u32,
    #[schema(format = "date-time")]
    pub created_at: String,
    #[schema(format = "date-time")]
    pub updated_at: String,
}

impl From<Record> for RecordBody {
    fn from(value: Record) -> Self {
        Self {
            id: value.id.get(),
            student: StudentResponseBody {
                name: value.student.name,
                emails: value
                    .student
                    .emails
                    .into_iter()
                    .map(|entry| EmailBody {
                        email: Some(entry.email),
                    })
                    .collect(),
                numbers: value
                    .student
                    .numbers
                    .into_iter()
                    .map(PhoneNumberResponseBody::from)
                    .collect(),
            },
            author: value.author.claims().as_map().clone(),
            attachment: value.attachment.map(|stored| stored.as_str().to_owned()),
            details: value.details.map(RecordDetailsBody::from),
            audit_log: value
                .audit_log
                .into_iter()
                .map(AuditEntryBody::from)
                .collect(),
            revision: value.revision,
            created_at: value.created_at.to_rfc3339(),
            updated_at: value.updated_at.to_rfc3339(),
        }
    }
}

/// Confirmation envelope for create and update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordEnvelopeBody {
    pub message: String,
    pub record: RecordBody,
}

impl RecordEnvelopeBody {
    fn new(message: &str, record: Record) -> Self {
        Self {
            message: message.to_owned(),
            record: RecordBody::from(record),
        }
    }
}

/// One page of records.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordPageBody {
    pub data: Vec<RecordBody>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl From<Paginated<Record>> for RecordPageBody {
    fn from(value: Paginated<Record>) -> Self {
        let page = value.map(RecordBody::from);
        Self {
            data: page.data,
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

/// Update fields collected from either body form.
#[derive(Debug, Default)]
struct UpdateForm {
    verified: Vec<NumberVerification>,
    comment: Option<String>,
    id: Option<String>,
    number: Option<String>,
    attachment: Option<AttachmentUpload>,
}

impl From<UpdateRecordRequestBody> for UpdateForm {
    fn from(value: UpdateRecordRequestBody) -> Self {
        Self {
            verified: value
                .verified
                .into_iter()
                .map(NumberVerification::from)
                .collect(),
            comment: value.comment,
            id: value.id,
            number: value.number,
            attachment: None,
        }
    }
}

fn multipart_error(error: MultipartError) -> Error {
    Error::invalid_request(format!("multipart body is malformed: {error}"))
        .with_details(json!({ "code": "invalid_multipart" }))
}

async fn read_field(field: &mut Field, name: FieldName, limit: usize) -> Result<Vec<u8>, Error> {
    let mut contents = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if contents.len().saturating_add(chunk.len()) > limit {
            return Err(too_large_error(name, limit));
        }
        contents.extend_from_slice(&chunk);
    }
    Ok(contents)
}

async fn read_text(field: &mut Field, name: FieldName) -> Result<String, Error> {
    let contents = read_field(field, name, MAX_TEXT_FIELD_BYTES).await?;
    String::from_utf8(contents).map_err(|_| invalid_text_error(name))
}

/// Parse the `verified` form field; blank text means no entries.
fn parse_verified_text(text: &str) -> Result<Vec<NumberVerification>, Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<VerificationBody>>(text)
        .map(|entries| entries.into_iter().map(NumberVerification::from).collect())
        .map_err(|err| invalid_json_error(FieldName::new("verified"), err))
}

async fn read_multipart(
    mut payload: Multipart,
    max_attachment_bytes: usize,
) -> Result<UpdateForm, Error> {
    let mut form = UpdateForm::default();
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "verified" => {
                let text = read_text(&mut field, FieldName::new("verified")).await?;
                form.verified = parse_verified_text(&text)?;
            }
            "comment" => {
                form.comment = Some(read_text(&mut field, FieldName::new("comment")).await?);
            }
            "id" => form.id = Some(read_text(&mut field, FieldName::new("id")).await?),
            "number" => {
                form.number = Some(read_text(&mut field, FieldName::new("number")).await?);
            }
            ATTACHMENT_FIELD => {
                let field_name = FieldName::new(ATTACHMENT_FIELD);
                let file_name = field
                    .content_disposition()
                    .and_then(|disposition| disposition.get_filename())
                    .map(str::to_owned)
                    .ok_or_else(|| missing_file_name_error(field_name))?;
                let contents = read_field(&mut field, field_name, max_attachment_bytes).await?;
                form.attachment = Some(AttachmentUpload {
                    file_name,
                    contents,
                });
            }
            other => {
                debug!(field = other, "ignoring unknown multipart field");
                while field.try_next().await.map_err(multipart_error)?.is_some() {}
            }
        }
    }
    Ok(form)
}

/// Choose the record locator; `id` wins over `number` and query values win
/// over body values.
fn build_locator(
    query: UpdateRecordQuery,
    id: Option<String>,
    number: Option<String>,
) -> Result<Option<RecordLocator>, Error> {
    if let Some(raw) = non_blank(query.id).or_else(|| non_blank(id)) {
        return parse_record_id(&raw, FieldName::new("id")).map(|id| Some(RecordLocator::Id(id)));
    }
    Ok(non_blank(query.number)
        .or_else(|| non_blank(number))
        .map(RecordLocator::Number))
}

async fn apply_update(
    state: &HttpState,
    auth: BearerAuth,
    query: UpdateRecordQuery,
    form: UpdateForm,
) -> ApiResult<HttpResponse> {
    let UpdateForm {
        verified,
        comment,
        id,
        number,
        attachment,
    } = form;
    let locator = build_locator(query, id, number)?;

    let response = state
        .records
        .update_record(UpdateRecordRequest {
            token: auth.into_token(),
            locator,
            verified,
            comment: non_blank(comment),
            attachment,
        })
        .await?;

    Ok(HttpResponse::Ok().json(RecordEnvelopeBody::new(UPDATED_MESSAGE, response.record)))
}

/// Route guard selecting the multipart update handler.
fn is_multipart(ctx: &GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

/// Create a walk-in record owned by the caller.
#[utoipa::path(
    post,
    path = "/api/v1/records",
    request_body = CreateRecordRequestBody,
    responses(
        (status = 201, description = "Record created", body = RecordEnvelopeBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "createRecord",
    security(("BearerAuth" = []))
)]
#[post("/records")]
pub async fn create_record(
    state: web::Data<HttpState>,
    auth: BearerAuth,
    payload: web::Json<CreateRecordRequestBody>,
) -> ApiResult<HttpResponse> {
    let response = state
        .records
        .create_record(CreateRecordRequest {
            token: auth.into_token(),
            student: payload.into_inner().student.into(),
        })
        .await?;

    Ok(HttpResponse::Created().json(RecordEnvelopeBody::new(CREATED_MESSAGE, response.record)))
}

/// List records created by the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/records",
    params(
        ("page" = Option<u32>, Query, description = "One-based page number, default 1"),
        ("limit" = Option<u32>, Query, description = "Page size, default 10"),
        ("number" = Option<String>, Query, description = "Only records containing this student number")
    ),
    responses(
        (status = 200, description = "Page of records", body = RecordPageBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "listRecords",
    security(("BearerAuth" = []))
)]
#[get("/records")]
pub async fn list_records(
    state: web::Data<HttpState>,
    auth: BearerAuth,
    query: web::Query<ListRecordsQuery>,
) -> ApiResult<web::Json<RecordPageBody>> {
    let ListRecordsQuery {
        page,
        limit,
        number,
    } = query.into_inner();

    let response = state
        .records_query
        .list_records(ListRecordsRequest {
            token: auth.into_token(),
            page,
            limit,
            number: non_blank(number),
        })
        .await?;

    Ok(web::Json(RecordPageBody::from(response.records)))
}

/// Merge verification states, a comment and an attachment into a record.
///
/// The record is chosen by `id`, then `number`, then the first verified
/// number that matches a stored record. A JSON body with the same fields is
/// accepted in place of the multipart form.
#[utoipa::path(
    post,
    path = "/api/v1/records/records-data",
    params(
        ("id" = Option<i64>, Query, description = "Identifier of the record to update"),
        ("number" = Option<String>, Query, description = "Update the newest record containing this number")
    ),
    request_body(content = UpdateRecordMultipartBody, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Record updated", body = RecordEnvelopeBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Caller does not own the record", body = ErrorSchema),
        (status = 404, description = "No matching record", body = ErrorSchema),
        (status = 409, description = "Concurrent update", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "updateRecord",
    security(("BearerAuth" = []))
)]
#[post("/records/records-data", guard = "is_multipart")]
pub async fn update_record_multipart(
    state: web::Data<HttpState>,
    auth: BearerAuth,
    query: web::Query<UpdateRecordQuery>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = read_multipart(payload, state.max_attachment_bytes).await?;
    apply_update(&state, auth, query.into_inner(), form).await
}

/// JSON variant of [`update_record_multipart`].
#[post("/records/records-data")]
pub async fn update_record_json(
    state: web::Data<HttpState>,
    auth: BearerAuth,
    query: web::Query<UpdateRecordQuery>,
    payload: web::Json<UpdateRecordRequestBody>,
) -> ApiResult<HttpResponse> {
    apply_update(
        &state,
        auth,
        query.into_inner(),
        UpdateForm::from(payload.into_inner()),
    )
    .await
}

/// Register the record routes and their extractor error handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(create_record)
        .service(list_records)
        .service(update_record_multipart)
        .service(update_record_json);
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
