use axum::Router;
use utoipa::{OpenApi, openapi::OpenApi as OpenApiDocument};
use utoipa_swagger_ui::SwaggerUi;

use crate::services::documentation::ApiDoc;

/// Where the interactive explorer is mounted.
pub const SWAGGER_UI_PATH: &str = "/docs";
/// Where the raw OpenAPI document is served.
pub const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// The quiz API document, versioned with the running build.
pub fn api_document() -> OpenApiDocument {
    let mut document = ApiDoc::openapi();
    document.info.version = env!("CARGO_PKG_VERSION").to_string();
    document
}

/// Explorer and raw document routes. They need no session state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new(SWAGGER_UI_PATH)
        .url(OPENAPI_JSON_PATH, api_document())
        .into()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn document_lists_gameplay_and_webhook_paths() {
        let document = api_document();
        assert_eq!(document.info.version, env!("CARGO_PKG_VERSION"));
        for path in ["/sessions/{pin}/answers", "/sessions/{pin}/next", "/sessions/{pin}/webhooks"] {
            assert!(document.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn raw_document_is_served() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router::<()>()).await;
        });

        let body: Value = reqwest::get(format!("http://{addr}{OPENAPI_JSON_PATH}"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["info"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["paths"]["/sessions/{pin}/answers"].is_object());
    }
}
