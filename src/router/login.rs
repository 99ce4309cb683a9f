use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token: String,
}

/// Handler to authenticate a user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let token = state.users.login(&body.email, &body.password).await?;

    Ok(Json(Response { token }))
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::router::register::tests::req_body;
    use crate::*;

    pub(crate) async fn register_and_confirm(
        state: &AppState,
        app: axum::Router,
        email: &str,
    ) -> i32 {
        let response = make_request(
            None,
            app.clone(),
            Method::POST,
            "/users/register",
            req_body(email).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let user = state
            .users
            .store
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap();
        let token = state.users.token.confirm(user.id).unwrap();

        let path = format!("/users/confirm/{}/{token}", user.id);
        let response =
            make_request(None, app, Method::GET, &path, String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        user.id
    }

    async fn login_reason(app: axum::Router, email: &str, password: &str) -> serde_json::Value {
        let response = make_request(
            None,
            app,
            Method::POST,
            "/users/login",
            json!({ "email": email, "password": password }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        body["type"].clone()
    }

    #[tokio::test]
    async fn test_login_handler() {
        let state = router::state();
        let app = app(state.clone());

        let id =
            register_and_confirm(&state, app.clone(), "ada@example.com").await;

        let response = make_request(
            None,
            app,
            Method::POST,
            "/users/login",
            json!({ "email": "ada@example.com", "password": "p4ssw0rd!" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();

        let claims = state.users.token.decode(&body.token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.purpose, token::Purpose::Session);
    }

    #[tokio::test]
    async fn test_login_before_confirmation_is_pending() {
        let state = router::state();
        let app = app(state);

        let response = make_request(
            None,
            app.clone(),
            Method::POST,
            "/users/register",
            req_body("ada@example.com").to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let reason =
            login_reason(app, "ada@example.com", "p4ssw0rd!").await;
        assert_eq!(reason, "user_pending");
    }

    #[tokio::test]
    async fn test_login_with_wrong_credentials() {
        let state = router::state();
        let app = app(state.clone());

        register_and_confirm(&state, app.clone(), "ada@example.com").await;

        let reason = login_reason(app.clone(), "ada@example.com", "nope!").await;
        assert_eq!(reason, "user_not_login");

        let reason = login_reason(app, "ghost@example.com", "p4ssw0rd!").await;
        assert_eq!(reason, "user_not_login");
    }

    #[tokio::test]
    async fn test_login_while_blocked() {
        let state = router::state();
        let app = app(state.clone());

        let id =
            register_and_confirm(&state, app.clone(), "ada@example.com").await;
        state
            .users
            .set_status(id, user::UserStatus::Blocked)
            .await
            .unwrap();

        let reason = login_reason(app, "ada@example.com", "p4ssw0rd!").await;
        assert_eq!(reason, "user_blocked");
    }
}
