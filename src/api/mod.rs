pub mod v1;

use crate::server::Server;
use std::sync::Arc;
use warp::Filter;

/// Every route under `/api/v1`, with JSON error replies and CORS applied.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cors = v1::cors(&server.cors_origins);
    warp::path("api")
        .and(warp::path("v1"))
        .and(v1::routes(server))
        .recover(v1::recover_error)
        .with(cors)
        .with(warp::trace::request())
}
