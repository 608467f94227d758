use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

use feed_server::entity::user;

use crate::common::{PASSWORD, TestApp, TestUser, routes};

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_user_can_register_with_valid_credentials() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "securepass",
                    "full_name": "Alice Liddell",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "Registration failed: {}", res.text);
        assert!(res.body["user"]["id"].is_number());
        assert_eq!(res.body["user"]["username"], "alice");
        assert_eq!(res.body["user"]["email"], "alice@example.com");
        assert_eq!(res.body["user"]["full_name"], "Alice Liddell");
        assert_eq!(res.body["user"]["provider"], "LOCAL");
        assert!(res.body["access_token"].is_string());
        assert!(res.body["refresh_token"].is_string());
        assert!(
            res.body["user"].get("password").is_none(),
            "Password hash must never be serialized"
        );
    }

    #[tokio::test]
    async fn cannot_register_with_an_already_taken_username() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "email": "other@example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "ALREADY_EXISTS");
        assert_eq!(res.body["message"], "Username already exists");
    }

    #[tokio::test]
    async fn cannot_register_with_an_already_taken_email() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice2", "email": "alice@example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "ALREADY_EXISTS");
        assert_eq!(res.body["message"], "Email already exists");
    }

    #[tokio::test]
    async fn cannot_register_with_a_password_that_is_too_short() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "email": "alice@example.com", "password": "short"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn cannot_register_with_an_invalid_username() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "no spaces!", "email": "a@example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn cannot_register_with_a_malformed_email() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "email": "not-an-email", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn github_placeholder_addresses_cannot_be_registered() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({
                    "username": "octocat",
                    "email": "octocat@github.local",
                    "password": PASSWORD,
                }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        let count = user::Entity::find().all(&app.db).await.unwrap().len();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn missing_fields_are_reported_as_validation_errors() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::REGISTER, &json!({"username": "alice"}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn registered_user_can_login_with_email() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"email": "alice@example.com", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200, "Login failed: {}", res.text);
        assert_eq!(res.body["user"]["id"], alice.id);
        assert!(res.body["access_token"].is_string());
    }

    #[tokio::test]
    async fn registered_user_can_login_with_username() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200, "Login failed: {}", res.text);
        assert_eq!(res.body["user"]["username"], "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": "wrongpassword"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn unknown_user_gets_the_same_error_as_a_wrong_password() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "ghost", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn login_without_an_identifier_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::LOGIN, &json!({"password": PASSWORD}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn disabled_account_cannot_login() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let model = user::Entity::find_by_id(alice.id)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: user::ActiveModel = model.into();
        active.enabled = Set(false);
        active.update(&app.db).await.unwrap();

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "ACCOUNT_DISABLED");

        let res = app.get_with_token(routes::ME, &alice.token).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "ACCOUNT_DISABLED");
    }
}

mod tokens {
    use super::*;

    #[tokio::test]
    async fn me_returns_the_authenticated_user() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app.get_with_token(routes::ME, &alice.token).await;

        assert_eq!(res.status, 200, "me failed: {}", res.text);
        assert_eq!(res.body["id"], alice.id);
        assert_eq!(res.body["username"], "alice");
    }

    #[tokio::test]
    async fn request_without_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not.a.jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn non_bearer_authorization_header_is_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .client
            .get(format!("http://{}{}", app.addr, routes::ME))
            .header("Authorization", format!("Token {}", alice.token))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 401);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn refresh_token_cannot_be_used_as_an_access_token() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app.get_with_token(routes::ME, &alice.refresh_token).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn refresh_returns_a_new_working_token_pair() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_without_token(
                routes::REFRESH,
                &json!({"refresh_token": alice.refresh_token}),
            )
            .await;

        assert_eq!(res.status, 200, "refresh failed: {}", res.text);
        let refreshed = TestUser::from_auth_response(&res);
        assert_eq!(refreshed.id, alice.id);

        let me = app.get_with_token(routes::ME, &refreshed.token).await;
        assert_eq!(me.status, 200);
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": alice.token}))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn logout_revokes_previously_issued_tokens() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_with_token(routes::LOGOUT, &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 204, "logout failed: {}", res.text);

        let me = app.get_with_token(routes::ME, &alice.token).await;
        assert_eq!(me.status, 401);
        assert_eq!(me.body["code"], "TOKEN_INVALID");

        let refresh = app
            .post_without_token(
                routes::REFRESH,
                &json!({"refresh_token": alice.refresh_token}),
            )
            .await;
        assert_eq!(refresh.status, 401);
        assert_eq!(refresh.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn login_after_logout_issues_usable_tokens() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        app.post_with_token(routes::LOGOUT, &json!({}), &alice.token)
            .await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200);
        let fresh = TestUser::from_auth_response(&res);

        let me = app.get_with_token(routes::ME, &fresh.token).await;
        assert_eq!(me.status, 200, "fresh token rejected: {}", me.text);
    }

    #[tokio::test]
    async fn token_for_a_deleted_user_is_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        user::Entity::delete_by_id(alice.id)
            .exec(&app.db)
            .await
            .unwrap();

        let res = app.get_with_token(routes::ME, &alice.token).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }
}
