use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Private sentinel used to carry an explicit 404 through the
/// `anyhow::Error` chain.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

/// Error type for page handlers. Rendered as plain text; this is a LAN
/// diagnostic tool, so the message goes straight to the browser.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            return (StatusCode::NOT_FOUND, n.0.clone()).into_response();
        }
        tracing::error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {:#}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn not_found_constructor_maps_to_404() {
        let response = AppError::not_found("404 page not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "404 page not found");
    }

    #[tokio::test]
    async fn other_errors_map_to_500_with_message() {
        let response = AppError(anyhow::anyhow!("identity service down")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(response).await,
            "Internal error: identity service down"
        );
    }

    #[tokio::test]
    async fn context_chain_is_rendered() {
        let err = anyhow::anyhow!("socket closed").context("looking up caller");
        let response = AppError(err).into_response();
        assert_eq!(
            body_text(response).await,
            "Internal error: looking up caller: socket closed"
        );
    }
}
