use serde_json::json;

use crate::common::{TestApp, routes};

mod profile {
    use super::*;

    #[tokio::test]
    async fn my_profile_includes_counts_and_user_fields() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app.get_with_token(routes::PROFILE, &alice.token).await;

        assert_eq!(res.status, 200, "get profile failed: {}", res.text);
        assert_eq!(res.body["id"], alice.id);
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["followers_count"], 0);
        assert_eq!(res.body["following_count"], 0);
        assert_eq!(res.body["is_following"], false);
    }

    #[tokio::test]
    async fn update_my_profile_changes_only_sent_fields() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .put_with_token(
                routes::PROFILE,
                &json!({"bio": "Down the rabbit hole"}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 200, "update profile failed: {}", res.text);
        assert_eq!(res.body["bio"], "Down the rabbit hole");
        assert_eq!(res.body["full_name"], "alice Tester");
    }

    #[tokio::test]
    async fn null_clears_an_optional_field() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        app.put_with_token(routes::PROFILE, &json!({"bio": "temporary"}), &alice.token)
            .await;

        let res = app
            .put_with_token(routes::PROFILE, &json!({"bio": null}), &alice.token)
            .await;

        assert_eq!(res.status, 200, "update profile failed: {}", res.text);
        assert!(res.body["bio"].is_null());
    }

    #[tokio::test]
    async fn overlong_bio_is_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .put_with_token(
                routes::PROFILE,
                &json!({"bio": "x".repeat(501)}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn profile_requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::PROFILE).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod other_users {
    use super::*;

    #[tokio::test]
    async fn any_user_profile_can_be_viewed() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;

        let res = app.get_with_token(&routes::user(bob.id), &alice.token).await;

        assert_eq!(res.status, 200, "get user failed: {}", res.text);
        assert_eq!(res.body["username"], "bob");
        assert_eq!(res.body["is_following"], false);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app.get_with_token(&routes::user(9999), &alice.token).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn owner_can_update_through_the_id_route() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .put_with_token(
                &routes::user(alice.id),
                &json!({"full_name": "Alice L."}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 200, "update user failed: {}", res.text);
        assert_eq!(res.body["full_name"], "Alice L.");
    }

    #[tokio::test]
    async fn cannot_update_someone_elses_profile() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;

        let res = app
            .put_with_token(
                &routes::user(bob.id),
                &json!({"bio": "hijacked"}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let bob_profile = app.get_with_token(&routes::user(bob.id), &bob.token).await;
        assert!(bob_profile.body["bio"].is_null());
    }
}
