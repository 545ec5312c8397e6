use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error kinds observed at the HTTP boundary. Grounded on
/// `file_host::error::FileHostError` — a flat `thiserror` enum with a
/// private `status_code` mapping, implementing `IntoResponse` directly
/// rather than via a middleware adapter for ordinary handler errors.
#[derive(Error, Debug)]
pub enum GatewayError {
	#[error("store error: {0}")]
	Store(#[from] evo_store::StoreError),

	#[error("request timed out")]
	RequestTimeout,

	#[error("service overloaded")]
	ServiceOverloaded,

	#[error("tower error: {0}")]
	Tower(#[from] tower::BoxError),
}

impl GatewayError {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::Store(_) | Self::Tower(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
			Self::ServiceOverloaded => StatusCode::SERVICE_UNAVAILABLE,
		}
	}
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		tracing::warn!(%self, %status, "request failed");
		(status, self.to_string()).into_response()
	}
}

/// Converts a tower `BoxError` surfaced by `HandleErrorLayer` into a typed
/// gateway error, the same dispatch `file_host::main::handle_tower_error`
/// performs.
pub async fn handle_tower_error(error: tower::BoxError) -> GatewayError {
	if error.is::<tower::timeout::error::Elapsed>() {
		GatewayError::RequestTimeout
	} else if error.is::<tower::load_shed::error::Overloaded>() {
		GatewayError::ServiceOverloaded
	} else {
		GatewayError::Tower(error)
	}
}
