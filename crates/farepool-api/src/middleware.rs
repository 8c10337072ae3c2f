use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use farepool_types::api::Claims;

use crate::ApiError;
use crate::auth::AppState;

/// Extract and validate the JWT from the Authorization header, stashing the
/// claims as a request extension for handlers. The secret comes from the
/// shared state, so the startup placeholder check covers this path too.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
    };
    use tower::ServiceExt;

    use farepool_types::models::BillShareBasis;

    use crate::auth::{AppState, AppStateInner, create_token};
    use crate::chat::ChatMirror;
    use crate::recommend::RankClient;

    fn test_state(secret: &str) -> AppState {
        Arc::new(AppStateInner {
            db: farepool_db::Database::open_in_memory().unwrap(),
            jwt_secret: secret.into(),
            chat: ChatMirror::new(None).unwrap(),
            ranker: RankClient::new("http://127.0.0.1:9".into()).unwrap(),
            bill_share: BillShareBasis::default(),
        })
    }

    fn protected_app(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(from_fn_with_state(state.clone(), super::require_auth))
            .with_state(state)
    }

    #[tokio::test]
    async fn only_tokens_signed_with_the_state_secret_pass() {
        let app = protected_app(test_state("state-secret"));

        let token = create_token("state-secret", 1, "rider").unwrap();
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // A token signed with any other secret is rejected.
        let forged = create_token("dev-secret-change-me", 1, "rider").unwrap();
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", format!("Bearer {forged}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
