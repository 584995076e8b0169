use actix_cors::Cors;
use actix_multipart::{Multipart, MultipartError};
use actix_web::error::BlockingError;
use actix_web::http::{Method, StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{AckResponse, ErrorResponse, PredictionResponse, StatusResponse};

use crate::inference::classify_image;
use crate::inference::model::{InferenceError, ModelState};

pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("No image file provided")]
    MissingInput,
    #[error("Empty file provided")]
    EmptyInput,
    #[error("{0}")]
    Processing(String),
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        PredictError::Processing(err.to_string())
    }
}

/// A body that cannot be parsed as multipart carries no files.
impl From<MultipartError> for PredictError {
    fn from(err: MultipartError) -> Self {
        warn!("Unreadable multipart body: {}", err);
        PredictError::MissingInput
    }
}

impl From<BlockingError> for PredictError {
    fn from(err: BlockingError) -> Self {
        PredictError::Processing(err.to_string())
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingInput | PredictError::EmptyInput => StatusCode::BAD_REQUEST,
            PredictError::ModelUnavailable | PredictError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Prediction failed: {}", self);
        } else {
            warn!("Rejected prediction request: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse::new(self.to_string()))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/predict")
                .route(web::post().to(predict))
                .route(web::method(Method::OPTIONS).to(preflight)),
        );
}

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

async fn home() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        status: "server is running".to_string(),
        success: true,
    })
}

async fn preflight() -> HttpResponse {
    HttpResponse::Ok().json(AckResponse { success: true })
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn predict(
    req: HttpRequest,
    model: web::Data<ModelState>,
    payload: web::Payload,
) -> Result<HttpResponse, PredictError> {
    let classifier = model.classifier().ok_or(PredictError::ModelUnavailable)?;

    if !is_multipart(&req) {
        return Err(PredictError::MissingInput);
    }
    let upload = read_image_field(Multipart::new(req.headers(), payload)).await?;
    if upload.filename.is_empty() {
        return Err(PredictError::EmptyInput);
    }

    let filename = upload.filename;
    let bytes = upload.bytes;
    let result = web::block(move || classify_image(classifier.as_ref(), &bytes)).await??;

    info!(
        "Classified {} as {} (scores {:?}, confidence {:.3})",
        filename,
        result.display_name(),
        result.scores,
        result.confidence
    );

    Ok(HttpResponse::Ok().json(PredictionResponse {
        prediction: result.display_name().to_string(),
        confidence: result.confidence,
        success: true,
    }))
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

/// Reads the first file part named [`IMAGE_FIELD`]. Parts without a filename are
/// plain form values and do not count as an upload.
async fn read_image_field(mut payload: Multipart) -> Result<Upload, PredictError> {
    while let Some(mut field) = payload.try_next().await? {
        let filename = field
            .content_disposition()
            .filter(|cd| cd.get_name() == Some(IMAGE_FIELD))
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let Some(filename) = filename else {
            while field.try_next().await?.is_some() {}
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Upload { filename, bytes });
    }
    Err(PredictError::MissingInput)
}
