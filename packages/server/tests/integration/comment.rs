use serde_json::json;

use crate::common::{TestApp, routes};

mod create_and_list {
    use super::*;

    #[tokio::test]
    async fn any_user_can_comment_on_a_post() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let post_id = app.create_post(&alice.token, "discuss").await;

        let res = app
            .post_with_token(
                &routes::comments(post_id),
                &json!({"content": "First!"}),
                &bob.token,
            )
            .await;

        assert_eq!(res.status, 201, "create comment failed: {}", res.text);
        assert_eq!(res.body["content"], "First!");
        assert_eq!(res.body["post_id"], post_id);
        assert_eq!(res.body["user"]["username"], "bob");

        let post = app.get_with_token(&routes::post(post_id), &alice.token).await;
        assert_eq!(post.body["comment_count"], 1);
    }

    #[tokio::test]
    async fn comments_are_listed_oldest_first() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let post_id = app.create_post(&alice.token, "thread").await;
        let first = app.create_comment(&bob.token, post_id, "one").await;
        let second = app.create_comment(&alice.token, post_id, "two").await;

        let res = app
            .get_with_token(&routes::comments(post_id), &bob.token)
            .await;

        assert_eq!(res.status, 200, "list comments failed: {}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], first);
        assert_eq!(data[1]["id"], second);
        assert_eq!(data[1]["user"]["username"], "alice");
        assert_eq!(res.body["pagination"]["total"], 2);
    }

    #[tokio::test]
    async fn commenting_on_an_unknown_post_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_with_token(
                &routes::comments(9999),
                &json!({"content": "hello?"}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn overlong_comment_is_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let post_id = app.create_post(&alice.token, "limits").await;

        let res = app
            .post_with_token(
                &routes::comments(post_id),
                &json!({"content": "x".repeat(1001)}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn listing_comments_requires_authentication() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let post_id = app.create_post(&alice.token, "private-ish").await;

        let res = app.get_without_token(&routes::comments(post_id)).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod update_and_delete {
    use super::*;

    #[tokio::test]
    async fn author_can_edit_their_comment() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let post_id = app.create_post(&alice.token, "post").await;
        let comment_id = app.create_comment(&alice.token, post_id, "typo").await;

        let res = app
            .put_with_token(
                &routes::comment(post_id, comment_id),
                &json!({"content": "fixed"}),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 200, "update comment failed: {}", res.text);
        assert_eq!(res.body["content"], "fixed");
        assert_eq!(res.body["id"], comment_id);
    }

    #[tokio::test]
    async fn non_author_cannot_edit_or_delete_a_comment() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let post_id = app.create_post(&alice.token, "post").await;
        let comment_id = app.create_comment(&bob.token, post_id, "bob's").await;

        // Owning the post does not grant rights over other people's comments.
        let res = app
            .put_with_token(
                &routes::comment(post_id, comment_id),
                &json!({"content": "alice's now"}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let res = app
            .delete_with_token(&routes::comment(post_id, comment_id), &alice.token)
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn author_can_delete_their_comment() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let post_id = app.create_post(&alice.token, "post").await;
        let comment_id = app.create_comment(&alice.token, post_id, "oops").await;

        let res = app
            .delete_with_token(&routes::comment(post_id, comment_id), &alice.token)
            .await;
        assert_eq!(res.status, 204, "delete comment failed: {}", res.text);

        let list = app
            .get_with_token(&routes::comments(post_id), &alice.token)
            .await;
        assert_eq!(list.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn comment_must_belong_to_the_post_in_the_path() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let post_a = app.create_post(&alice.token, "a").await;
        let post_b = app.create_post(&alice.token, "b").await;
        let comment_id = app.create_comment(&alice.token, post_a, "on a").await;

        let res = app
            .delete_with_token(&routes::comment(post_b, comment_id), &alice.token)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}
