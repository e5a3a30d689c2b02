use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn health_check() -> impl warp::Reply {
    warp::reply::json(&ApiResponse::ok(HealthResponse { status: "ok" }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub audience_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub subject_id: SubjectId,
    pub role: Role,
    pub auth_tokens: AuthTokens,
}

pub async fn login(
    body: LoginRequest,
    ctx: CallContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
        audience_id: body.audience_id.map(AudienceId::new),
    };
    let login_result = auth_service
        .login(&ctx, login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let login_response = LoginResponse {
        subject_id: login_result.subject_id,
        role: login_result.role,
        auth_tokens: login_result.tokens,
    };
    Ok(warp::reply::json(&ApiResponse::ok(login_response)))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub nick: String,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub subject_id: SubjectId,
}

/// Public sign-up. The role is always `user`; elevated roles are granted elsewhere.
pub async fn register(
    body: RegisterRequest,
    ctx: CallContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let credential = NewCredential {
        email: body.email,
        password: body.password,
        role: Role::User,
        nick: body.nick,
        birthday: body.birthday,
    };
    let subject_id = auth_service
        .register(&ctx, credential)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let json = warp::reply::json(&ApiResponse::ok(RegisterResponse { subject_id }));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: RefreshToken,
}

pub async fn refresh(
    body: RefreshRequest,
    ctx: CallContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh(&ctx, &body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Serialize)]
pub struct SessionEnded {
    pub subject_id: SubjectId,
}

pub async fn logout(
    auth: AuthContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service.logout(auth.subject_id());
    Ok(warp::reply::json(&ApiResponse::ok(SessionEnded {
        subject_id: auth.subject_id(),
    })))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject_id: SubjectId,
    pub role: Role,
    pub audience_id: Option<AudienceId>,
    pub expires_at: DateTime<Utc>,
}

pub async fn me(auth: AuthContext) -> Result<impl warp::Reply, warp::Rejection> {
    let claims = auth.claims();
    Ok(warp::reply::json(&ApiResponse::ok(MeResponse {
        subject_id: auth.subject_id(),
        role: auth.role(),
        audience_id: claims.audience_id.clone(),
        expires_at: claims.expires_at,
    })))
}

/// Administrator ends someone else's session.
pub async fn revoke_session(
    subject_id: SubjectId,
    auth: AuthContext,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    tracing::info!(%subject_id, by = %auth.subject_id(), "session revoked by administrator");
    auth_service.logout(subject_id);
    Ok(warp::reply::json(&ApiResponse::ok(SessionEnded { subject_id })))
}
