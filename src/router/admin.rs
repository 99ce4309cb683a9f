//! Role-gated user administration.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::user::{Role, User, UserStatus, UserUpdate};

/// A user record together with its ownership index.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(flatten)]
    pub user: User,
    pub article_ids: Vec<i32>,
    pub comment_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub user_id: i32,
    #[validate(length(min = 1, max = 100, message = "Names must not be empty."))]
    pub names: String,
    #[validate(length(min = 1, max = 100, message = "Surnames must not be empty."))]
    pub surnames: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    pub role: Role,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Response>> {
    let (user, owned) = state.users.get(user_id).await?;

    Ok(Json(Response {
        user,
        article_ids: owned.article_ids,
        comment_ids: owned.comment_ids,
    }))
}

/// Full-record overwrite of the mutable fields.
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Valid(body): Valid<UpdateBody>,
) -> Result<StatusCode> {
    if body.user_id != user_id {
        return Err(ServerError::IdMismatch);
    }

    state
        .users
        .update(
            user_id,
            UserUpdate {
                names: body.names,
                surnames: body.surnames,
                email: body.email,
                role: body.role,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<StatusCode> {
    state.users.delete(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<StatusCode> {
    state.users.set_status(user_id, UserStatus::Blocked).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pending(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<StatusCode> {
    state.users.set_status(user_id, UserStatus::Pending).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<StatusCode> {
    state.users.set_status(user_id, UserStatus::Active).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::util::ServiceExt;

    use super::*;
    use crate::router::register::tests::req_body;
    use crate::user::MemoryUserStore;
    use crate::*;

    async fn registered_id(state: &AppState, app: axum::Router, email: &str) -> i32 {
        let response = make_request(
            None,
            app,
            Method::POST,
            "/users/register",
            req_body(email).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        state
            .users
            .store
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_admin_routes_require_a_token() {
        let app = app(router::state());

        let response = make_request(
            None,
            app,
            Method::GET,
            "/users",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_admin_session_is_refused() {
        let state = router::state();
        let app = app(state.clone());

        let token = state.users.token.session(1, Role::User).unwrap();
        let response = app
            .clone()
            .oneshot(
                axum::extract::Request::builder()
                    .method(Method::GET)
                    .uri("/users")
                    .header("authorization", format!("Bearer {token}"))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_users() {
        let state = router::state();
        let app = app(state.clone());

        registered_id(&state, app.clone(), "ada@example.com").await;
        registered_id(&state, app.clone(), "grace@example.com").await;

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/users",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.len(), 2);
    }

    #[tokio::test]
    async fn test_get_user_with_ownership_index() {
        let store = Arc::new(MemoryUserStore::new());
        let state = router::state_with(store.clone());
        let app = app(state.clone());

        let id = registered_id(&state, app.clone(), "ada@example.com").await;
        store.add_article(id, 11).await;
        store.add_comment(id, 4).await;

        let path = format!("/users/{id}");
        let response = make_request(
            Some(&state),
            app.clone(),
            Method::GET,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.user.id, id);
        assert_eq!(body.article_ids, vec![11]);
        assert_eq!(body.comment_ids, vec![4]);

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/users/999",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_user() {
        let state = router::state();
        let app = app(state.clone());

        let id = registered_id(&state, app.clone(), "ada@example.com").await;

        let path = format!("/users/{id}");
        let response = make_request(
            Some(&state),
            app.clone(),
            Method::PUT,
            &path,
            json!({
                "userId": id,
                "names": "Augusta Ada",
                "surnames": "King",
                "email": "countess@example.com",
                "role": "Admin",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let user = state.users.store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.names, "Augusta Ada");
        assert_eq!(user.email, "countess@example.com");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::PUT,
            "/users/999",
            json!({
                "userId": 999,
                "names": "Ada",
                "surnames": "Lovelace",
                "email": "ada@example.com",
                "role": "User",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_with_mismatched_id() {
        let state = router::state();
        let app = app(state.clone());

        let id = registered_id(&state, app.clone(), "ada@example.com").await;

        let path = format!("/users/{id}");
        let response = make_request(
            Some(&state),
            app,
            Method::PUT,
            &path,
            json!({
                "userId": id + 1,
                "names": "Ada",
                "surnames": "Lovelace",
                "email": "ada@example.com",
                "role": "User",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let state = router::state();
        let app = app(state.clone());

        let id = registered_id(&state, app.clone(), "ada@example.com").await;

        let path = format!("/users/{id}");
        let response = make_request(
            Some(&state),
            app.clone(),
            Method::DELETE,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::GET,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Deleting again reports the absence.
        let response = make_request(
            Some(&state),
            app,
            Method::DELETE,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_overwrites() {
        let state = router::state();
        let app = app(state.clone());

        let id = registered_id(&state, app.clone(), "ada@example.com").await;

        for (route, status) in [
            ("blocked", UserStatus::Blocked),
            ("active", UserStatus::Active),
            ("pending", UserStatus::Pending),
        ] {
            let path = format!("/users/{route}/{id}");
            let response = make_request(
                Some(&state),
                app.clone(),
                Method::PUT,
                &path,
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);

            let user =
                state.users.store.find_by_id(id).await.unwrap().unwrap();
            assert_eq!(user.status, status);
        }

        let response = make_request(
            Some(&state),
            app,
            Method::PUT,
            "/users/blocked/999",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
