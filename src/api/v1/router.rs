use super::error::*;
use super::handler;
use crate::application_impl::AccessGate;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health_check = warp::path("health-check")
        .and(warp::path::end())
        .and(warp::get())
        .map(handler::health_check);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(prevent_if_authenticated(server.gate.clone()))
        .and(json_body())
        .and(with_call_context(server.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(prevent_if_authenticated(server.gate.clone()))
        .and(json_body())
        .and(with_call_context(server.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with_call_context(server.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_access(server.clone(), RoleRequirement::Authenticated))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_access(server.clone(), RoleRequirement::Authenticated))
        .and_then(handler::me);

    let revoke_session = warp::path!("sessions" / SubjectId)
        .and(warp::delete())
        .and(with_access(
            server.clone(),
            RoleRequirement::OneOf(vec![Role::Admin, Role::UserAdmin]),
        ))
        .and(with(server.auth_service.clone()))
        .and_then(handler::revoke_session);

    health_check
        .or(login)
        .or(register)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(revoke_session)
}

pub fn cors(allowed_origins: &[String]) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["Content-Type", "Authorization"]);
    if allowed_origins.is_empty() {
        builder.allow_any_origin()
    } else {
        builder.allow_origins(allowed_origins.iter().map(String::as_str))
    }
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with_call_context(
    server: Arc<Server>,
) -> impl Filter<Extract = (CallContext,), Error = Infallible> + Clone {
    warp::any().map(move || server.call_context())
}

fn authorization_header() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str())
}

/// Runs the access gate and hands the verified `AuthContext` to the handler.
fn with_access(
    server: Arc<Server>,
    requirement: RoleRequirement,
) -> impl Filter<Extract = (AuthContext,), Error = warp::Rejection> + Clone {
    authorization_header().and_then(move |authorization: Option<String>| {
        let server = server.clone();
        let requirement = requirement.clone();
        async move {
            let ctx = server.call_context();
            server
                .gate
                .admit(&ctx, authorization.as_deref(), &requirement)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)
        }
    })
}

fn prevent_if_authenticated(
    gate: Arc<AccessGate>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    authorization_header()
        .and_then(move |authorization: Option<String>| {
            let gate = gate.clone();
            async move {
                gate.prevent_if_authenticated(authorization.as_deref())
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            }
        })
        .untuple_one()
}
