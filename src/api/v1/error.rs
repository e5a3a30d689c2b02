use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        debug!("rejected request body: {}", e);
        ApiErrorCode::BadRequest
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiErrorCode::PayloadTooLarge
    } else if err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        ApiErrorCode::BadRequest
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed
    } else {
        ApiErrorCode::internal(format!("unhandled rejection: {:?}", err))
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authorization token is missing")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Session was replaced by a newer login")]
    SessionSuperseded,
    #[error("Session has been ended")]
    SessionRevoked,
    #[error("Token role is out of date")]
    StaleRole,
    #[error("Insufficient role for this resource")]
    InsufficientRole,
    #[error("Already logged in")]
    AlreadyLoggedIn,
    #[error("Email already registered")]
    AlreadyExists,
    #[error("Invalid registration data")]
    InvalidInput,
    #[error("Malformed request")]
    BadRequest,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Request timed out")]
    RequestTimeout,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::SessionSuperseded
            | ApiErrorCode::SessionRevoked
            | ApiErrorCode::StaleRole => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InsufficientRole | ApiErrorCode::AlreadyLoggedIn => StatusCode::FORBIDDEN,
            ApiErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput | ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::AlreadyExists => ApiErrorCode::AlreadyExists,
            AuthError::Unauthenticated(reason) => match reason {
                UnauthenticatedReason::MissingToken => ApiErrorCode::MissingToken,
                UnauthenticatedReason::InvalidToken => ApiErrorCode::InvalidToken,
                UnauthenticatedReason::Expired => ApiErrorCode::TokenExpired,
                UnauthenticatedReason::SessionSuperseded => ApiErrorCode::SessionSuperseded,
                UnauthenticatedReason::Revoked => ApiErrorCode::SessionRevoked,
                UnauthenticatedReason::StaleRole => ApiErrorCode::StaleRole,
            },
            AuthError::Forbidden(ForbiddenReason::InsufficientRole) => ApiErrorCode::InsufficientRole,
            AuthError::Forbidden(ForbiddenReason::AlreadyLoggedIn) => ApiErrorCode::AlreadyLoggedIn,
            AuthError::Unavailable(e) => {
                warn!("dependency unavailable: {}", e);
                ApiErrorCode::ServiceUnavailable
            }
            AuthError::Cancelled => ApiErrorCode::RequestTimeout,
            AuthError::InvalidInput(e) => {
                debug!("invalid input: {}", e);
                ApiErrorCode::InvalidInput
            }
            AuthError::Internal(e) => ApiErrorCode::internal(e),
        }
    }
}
