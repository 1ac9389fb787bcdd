use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use hello_tonic_core::{
    proto::{HelloResponse, hello_service_client::HelloServiceClient},
    types::HELLO_HTTP_PATH,
};
use serde::{Deserialize, Serialize};
use tonic::{Code, Status, transport::Channel};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
struct GatewayState {
    client: HelloServiceClient<Channel>,
}

/// Builds the REST routes, forwarding to the gRPC listener through `client`.
pub fn router(client: HelloServiceClient<Channel>) -> Router {
    Router::new()
        .route(HELLO_HTTP_PATH, get(hello).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(GatewayState { client })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn hello(State(mut state): State<GatewayState>) -> Result<Json<HelloResponse>, GatewayError> {
    let response = state.client.hello(()).await?;
    Ok(Json(response.into_inner()))
}

async fn not_found() -> GatewayError {
    GatewayError(Status::not_found("Not Found"))
}

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &Status::unimplemented("Method Not Allowed"),
    )
}

/// JSON error body, identical to grpc-gateway's `google.rpc.Status` rendering.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    pub details: Vec<serde_json::Value>,
}

/// An RPC failure surfaced over HTTP.
#[derive(Debug)]
pub struct GatewayError(pub Status);

impl From<Status> for GatewayError {
    fn from(status: Status) -> Self {
        Self(status)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error_response(http_status(self.0.code()), &self.0)
    }
}

fn error_response(http: StatusCode, status: &Status) -> Response {
    let body = ErrorBody {
        code: status.code() as i32,
        message: status.message().to_owned(),
        details: Vec::new(),
    };
    (http, Json(body)).into_response()
}

/// HTTP status grpc-gateway answers with for a given RPC code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // Client Closed Request, nginx's convention.
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_like_grpc_gateway() {
        assert_eq!(http_status(Code::Ok), StatusCode::OK);
        assert_eq!(http_status(Code::Cancelled).as_u16(), 499);
        assert_eq!(http_status(Code::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(Code::DeadlineExceeded), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(http_status(Code::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(http_status(Code::Aborted), StatusCode::CONFLICT);
        assert_eq!(http_status(Code::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(http_status(Code::ResourceExhausted), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(http_status(Code::Unimplemented), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(http_status(Code::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http_status(Code::DataLoss), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_body_matches_protojson_status() {
        let body = ErrorBody {
            code: Code::Unavailable as i32,
            message: "going away".to_owned(),
            details: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "code": 14, "message": "going away", "details": [] })
        );
    }

    #[test]
    fn gateway_error_uses_mapped_status() {
        let response = GatewayError(Status::unavailable("down")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
