use serde_json::json;

use crate::common::{TestApp, routes};

mod toggle {
    use super::*;

    #[tokio::test]
    async fn first_toggle_follows_and_second_unfollows() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;

        let res = app
            .post_with_token(&routes::follow(bob.id), &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "follow failed: {}", res.text);
        assert_eq!(res.body["is_following"], true);
        assert_eq!(res.body["follower_count"], 1);
        assert_eq!(res.body["following_count"], 0);

        let res = app
            .post_with_token(&routes::follow(bob.id), &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "unfollow failed: {}", res.text);
        assert_eq!(res.body["is_following"], false);
        assert_eq!(res.body["follower_count"], 0);
    }

    #[tokio::test]
    async fn profiles_reflect_the_follow_edge() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        app.post_with_token(&routes::follow(bob.id), &json!({}), &alice.token)
            .await;

        let bob_seen_by_alice = app.get_with_token(&routes::user(bob.id), &alice.token).await;
        assert_eq!(bob_seen_by_alice.body["followers_count"], 1);
        assert_eq!(bob_seen_by_alice.body["is_following"], true);

        let alice_profile = app.get_with_token(routes::PROFILE, &alice.token).await;
        assert_eq!(alice_profile.body["following_count"], 1);
        assert_eq!(alice_profile.body["followers_count"], 0);

        let alice_seen_by_bob = app.get_with_token(&routes::user(alice.id), &bob.token).await;
        assert_eq!(alice_seen_by_bob.body["is_following"], false);
    }

    #[tokio::test]
    async fn cannot_follow_yourself() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_with_token(&routes::follow(alice.id), &json!({}), &alice.token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn following_an_unknown_user_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .post_with_token(&routes::follow(9999), &json!({}), &alice.token)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn follow_requires_authentication() {
        let app = TestApp::spawn().await;
        let bob = app.create_user("bob").await;

        let res = app
            .post_without_token(&routes::follow(bob.id), &json!({}))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn followers_are_listed_most_recent_first() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let carol = app.create_user("carol").await;

        app.post_with_token(&routes::follow(alice.id), &json!({}), &bob.token)
            .await;
        app.post_with_token(&routes::follow(alice.id), &json!({}), &carol.token)
            .await;

        let res = app
            .get_with_token(&routes::followers(alice.id), &alice.token)
            .await;

        assert_eq!(res.status, 200, "list followers failed: {}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["username"], "carol");
        assert_eq!(data[1]["username"], "bob");
        assert_eq!(res.body["pagination"]["total"], 2);
        assert_eq!(res.body["pagination"]["page"], 1);
        assert_eq!(res.body["pagination"]["per_page"], 20);
        assert_eq!(res.body["pagination"]["total_pages"], 1);
    }

    #[tokio::test]
    async fn following_list_marks_who_the_caller_follows() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let carol = app.create_user("carol").await;

        app.post_with_token(&routes::follow(bob.id), &json!({}), &alice.token)
            .await;
        app.post_with_token(&routes::follow(carol.id), &json!({}), &alice.token)
            .await;
        app.post_with_token(&routes::follow(carol.id), &json!({}), &bob.token)
            .await;

        // Bob looks at whom Alice follows: himself and Carol.
        let res = app
            .get_with_token(&routes::following(alice.id), &bob.token)
            .await;

        assert_eq!(res.status, 200, "list following failed: {}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let carol_entry = data.iter().find(|p| p["username"] == "carol").unwrap();
        assert_eq!(carol_entry["is_following"], true);
        assert_eq!(carol_entry["followers_count"], 2);
        let bob_entry = data.iter().find(|p| p["username"] == "bob").unwrap();
        assert_eq!(bob_entry["is_following"], false);
    }

    #[tokio::test]
    async fn listing_is_paginated() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        for name in ["bob", "carol", "dave"] {
            let follower = app.create_user(name).await;
            app.post_with_token(&routes::follow(alice.id), &json!({}), &follower.token)
                .await;
        }

        let res = app
            .get_with_token(
                &format!("{}?page=2&per_page=2", routes::followers(alice.id)),
                &alice.token,
            )
            .await;

        assert_eq!(res.status, 200, "list followers failed: {}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(res.body["data"][0]["username"], "bob");
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["total_pages"], 2);
    }

    #[tokio::test]
    async fn listing_for_unknown_user_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let res = app
            .get_with_token(&routes::followers(9999), &alice.token)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}
