use crate::Error;
use async_trait::async_trait;
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

pub const INVALID_PARAMETERS: &str = "Invalid parameters";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Body of `POST /predict`, accepted as JSON, urlencoded or multipart form
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictParams {
    pub input_dataset: String,
    pub output_dataset: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPredictParams {
    #[serde(default)]
    input_dataset: Option<String>,
    #[serde(default)]
    output_dataset: Option<String>,
}

impl TryFrom<RawPredictParams> for PredictParams {
    type Error = Error;

    fn try_from(raw: RawPredictParams) -> Result<Self, Self::Error> {
        match (raw.input_dataset, raw.output_dataset) {
            (Some(input_dataset), Some(output_dataset))
                if !input_dataset.is_empty() && !output_dataset.is_empty() =>
            {
                Ok(Self {
                    input_dataset,
                    output_dataset,
                })
            }
            _ => Err(Error::invalid_parameters(
                "input_dataset and output_dataset are required",
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for PredictParams
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let raw = if is_json(req.headers()) {
            Json::<RawPredictParams>::from_request(req, state)
                .await
                .map(|Json(raw)| raw)
                .map_err(|e| {
                    debug!("Rejected JSON body: {}", e.body_text());
                    Error::invalid_parameters("malformed JSON body")
                })?
        } else if is_multipart(req.headers()) {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| {
                debug!("Rejected multipart body: {}", e.body_text());
                Error::invalid_parameters("malformed multipart body")
            })?;
            read_multipart(multipart).await?
        } else {
            Form::<RawPredictParams>::from_request(req, state)
                .await
                .map(|Form(raw)| raw)
                .map_err(|e| {
                    debug!("Rejected form body: {}", e.body_text());
                    Error::invalid_parameters("malformed form body")
                })?
        };

        raw.try_into()
    }
}

/// Collects the two text fields; file parts and unknown fields are skipped.
async fn read_multipart(mut multipart: Multipart) -> Result<RawPredictParams, Error> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        debug!("Rejected multipart field: {}", e.body_text());
        Error::invalid_parameters("malformed multipart body")
    };

    let mut raw = RawPredictParams::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.file_name().is_some() {
            continue;
        }
        let slot = match field.name() {
            Some("input_dataset") => &mut raw.input_dataset,
            Some("output_dataset") => &mut raw.output_dataset,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(malformed)?);
    }

    Ok(raw)
}

fn mime_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
}

fn is_json(headers: &HeaderMap) -> bool {
    mime_type(headers)
        .map(|mime| {
            mime == "application/json"
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    mime_type(headers).is_some_and(|mime| mime == "multipart/form-data")
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Error::InvalidParameters(_) => INVALID_PARAMETERS.to_string(),
            Error::InvalidInputFile { message } => message,
            _ => INTERNAL_ERROR.to_string(),
        };
        (status, body).into_response()
    }
}
