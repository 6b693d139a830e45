// src/error.rs
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

/// Why a single upstream lookup produced no data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no bars returned for {0}")]
    EmptySeries(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid category")]
    InvalidCategory(String),

    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
}

/// Rejections raised by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid category")]
    InvalidCategory,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    CatalogLoad(String),

    #[error("Market data provider unavailable")]
    ProviderUnavailable,

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

impl Reject for ApiError {}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidCategory(_) => ApiError::InvalidCategory,
            load @ CatalogError::Load { .. } => ApiError::CatalogLoad(load.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCategory => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::CatalogLoad(_) | ApiError::Chart(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    // A bad query string on /stocks also fails the page catch-all, so it is
    // checked before handler errors.
    if let Some(invalid) = err.find::<warp::reject::InvalidQuery>() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": invalid.to_string() })),
            StatusCode::BAD_REQUEST,
        )
        .into_response());
    }

    if let Some(api_err) = err.find::<ApiError>() {
        let status = api_err.status();
        let reply = match api_err {
            // Not-found conditions answer in plain text, everything else in JSON.
            ApiError::NotFound(msg) => {
                warp::reply::with_status(msg.clone(), status).into_response()
            }
            other => warp::reply::with_status(
                warp::reply::json(&json!({ "error": other.to_string() })),
                status,
            )
            .into_response(),
        };
        return Ok(reply);
    }

    if err.is_not_found() {
        return Ok(
            warp::reply::with_status("404 Not Found", StatusCode::NOT_FOUND).into_response(),
        );
    }

    log::error!("Unhandled rejection: {:?}", err);
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": "Internal server error" })),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response())
}
