use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// `axum::Json<T>` whose rejections come back in the API error envelope.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(body_rejected)?;
        Ok(Self(value))
    }
}

/// serde's own text names the offending field and position, which is what a
/// producer needs to find the bad record in a change batch.
fn body_rejected(rejection: JsonRejection) -> AppError {
    let kind = match &rejection {
        JsonRejection::JsonDataError(_) => "data",
        JsonRejection::JsonSyntaxError(_) => "syntax",
        JsonRejection::MissingJsonContentType(_) => "content_type",
        JsonRejection::BytesRejection(_) => "bytes",
        _ => "other",
    };
    let status = rejection.status();
    let detail = rejection.body_text();
    tracing::warn!(kind, %status, detail = %detail, "Request body rejected");

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError {
            status,
            code: "PAYLOAD_TOO_LARGE".to_string(),
            message: "Request body exceeds the size limit".to_string(),
            is_operational: true,
        };
    }
    AppError::bad_request("INVALID_REQUEST_BODY", &format!("Invalid request body: {detail}"))
}
