// src/handlers.rs
use crate::{
    AppState,
    errors::RestorationError,
    models::{AnalysisResult, DefectType, RestorationRequest},
    services::ImageHandle,
};
use actix_multipart::{Multipart, MultipartError};
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const JSON_BODY_LIMIT: usize = 1024 * 1024;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(|err, _req| {
                RestorationError::InvalidInput(format!("Malformed JSON body: {}", err)).into()
            }),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        RestorationError::InvalidInput(format!("Malformed query: {}", err)).into()
    }))
    .service(
        web::scope("/api")
            .route("/analyze", web::post().to(analyze_image))
            .route("/restore", web::post().to(restore_image))
            .route("/validate", web::post().to(validate_restoration))
            .route("/cleanup", web::post().to(cleanup))
            .route("/health", web::get().to(health_check)),
    );
}

struct ImageUpload {
    data: Vec<u8>,
    content_type: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    image: Option<ImageUpload>,
    fields: HashMap<String, String>,
}

async fn read_form(mut payload: Multipart, max_bytes: usize) -> Result<UploadForm, Error> {
    let mut form = UploadForm::default();
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await.map_err(malformed_upload)? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed_upload)? {
            total += chunk.len();
            if total > max_bytes {
                return Err(RestorationError::InvalidInput(format!(
                    "Upload exceeds {} byte limit",
                    max_bytes
                ))
                .into());
            }
            data.extend_from_slice(&chunk);
        }

        if name == "image" {
            form.image = Some(ImageUpload { data, content_type });
        } else {
            form.fields
                .insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    Ok(form)
}

fn malformed_upload(err: MultipartError) -> RestorationError {
    RestorationError::InvalidInput(format!("Malformed upload: {}", err))
}

pub async fn analyze_image(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let form = read_form(payload, data.max_upload_bytes).await?;
    let upload = form
        .image
        .ok_or_else(|| RestorationError::InvalidInput("No image uploaded".to_string()))?;

    let outcome = data
        .pipeline
        .analyze(&upload.data, upload.content_type.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "analysis": outcome.analysis,
        "imageId": outcome.original,
        "message": "Image analysis completed successfully"
    })))
}

pub async fn restore_image(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let form = read_form(payload, data.max_upload_bytes).await?;

    let request = RestorationRequest {
        defects_to_fix: parse_defect_selection(form.fields.get("defectsToFix").map(String::as_str))?,
        enhance_colors: form.fields.get("enhanceColors").is_some_and(|v| v == "true"),
        preserve_original: form.fields.get("preserveOriginal").is_none_or(|v| v != "false"),
        analysis: form
            .fields
            .get("analysisData")
            .and_then(|raw| parse_analysis_data(&Value::String(raw.clone()))),
    };

    let upload = form
        .image
        .ok_or_else(|| RestorationError::InvalidInput("No image uploaded".to_string()))?;

    let outcome = data
        .pipeline
        .restore(&upload.data, upload.content_type.as_deref(), &request)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "restoredImage": outcome.image.to_data_url(),
        "restoredPath": outcome.restored,
        "mimeType": outcome.image.mime_type,
        "message": "Image restored successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    original_path: Option<String>,
    restored_path: Option<String>,
    #[serde(default)]
    analysis_data: Option<Value>,
}

pub async fn validate_restoration(
    body: web::Json<ValidateBody>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let (Some(original), Some(restored)) = (body.original_path, body.restored_path) else {
        return Err(RestorationError::InvalidInput(
            "Both original and restored image paths are required".to_string(),
        )
        .into());
    };
    let original = ImageHandle::parse(&original)?;
    let restored = ImageHandle::parse(&restored)?;
    let analysis = body.analysis_data.as_ref().and_then(parse_analysis_data);

    let outcome = data
        .pipeline
        .validate(&original, &restored, analysis.as_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "validation": {
            "contentValidation": outcome.validation,
            "elementComparison": outcome.validation.element_comparison,
            "overallResult": outcome.verdict.overall_result,
            "confidenceScore": outcome.verdict.confidence_score
        },
        "message": outcome.verdict.message
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupQuery {
    max_age_seconds: Option<u64>,
}

pub async fn cleanup(
    query: web::Query<CleanupQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let max_age = query
        .max_age_seconds
        .map(Duration::from_secs)
        .unwrap_or(data.temp_retention);

    let report = data.pipeline.cleanup(max_age).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Cleanup completed",
        "removed": report.removed,
        "failed": report.failed
    })))
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "OK",
        "message": "3-Stage Restoration API is running",
        "stages": ["ANALYSIS", "RESTORATION", "VALIDATION"],
        "model": data.pipeline.model_name()
    }))
}

/// `defectsToFix` arrives as a JSON array of labels. Absent or blank means
/// "use the defaults"; anything unreadable is rejected.
fn parse_defect_selection(raw: Option<&str>) -> Result<BTreeSet<DefectType>, RestorationError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(BTreeSet::new());
    };

    let labels: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        RestorationError::InvalidInput(format!(
            "defectsToFix must be a JSON array of defect types: {}",
            e
        ))
    })?;

    labels
        .iter()
        .map(|label| {
            DefectType::parse_label(label).ok_or_else(|| {
                RestorationError::InvalidInput(format!("Unknown defect type: {}", label))
            })
        })
        .collect()
}

/// Analysis data is advisory: it may come as an object or as a JSON string,
/// and an unreadable value is ignored.
fn parse_analysis_data(value: &Value) -> Option<AnalysisResult> {
    let parsed = match value {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    };
    parsed
        .inspect_err(|e| warn!("Could not parse analysis data: {}", e))
        .ok()
}
