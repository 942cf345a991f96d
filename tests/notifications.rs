mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn follows_likes_and_comments_notify_the_author() {
    let app = TestApp::new();
    let author = app.register("famous").await;
    let fan = app.register("admirer").await;
    let post = app.create_post(&author, "new pr", "public").await;

    app.post(&format!("/users/{}/follow", author.id), &fan.token, json!({})).await;
    app.post(&format!("/posts/{post}/like"), &fan.token, json!({})).await;
    app.post(&format!("/posts/{post}/comments"), &fan.token, json!({ "content": "beast" })).await;
    // Own activity stays quiet.
    app.post(&format!("/posts/{post}/like"), &author.token, json!({})).await;

    let (status, body) = app.get("/notifications", &author.token).await;
    assert_eq!(status, StatusCode::OK);
    let mut kinds: Vec<_> = body["items"].as_array().unwrap().iter().map(|n| n["type"].as_str().unwrap()).collect();
    kinds.sort();
    assert_eq!(kinds, ["comment", "follow", "like"]);
    assert_eq!(body["pagination"]["total"], 3);

    let (_, body) = app.get("/notifications/unread/count", &author.token).await;
    assert_eq!(body, json!({ "count": 3 }));

    let (_, body) = app.get("/notifications", &fan.token).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn read_state_and_cleanup() {
    let app = TestApp::new();
    let author = app.register("popular").await;
    let post = app.create_post(&author, "hello", "public").await;
    for name in ["one_fan", "two_fan", "three_fan"] {
        let fan = app.register(name).await;
        app.post(&format!("/posts/{post}/like"), &fan.token, json!({})).await;
    }

    let (_, likes) = app.get("/notifications/type/like", &author.token).await;
    let ids: Vec<String> = likes.as_array().unwrap().iter().map(|n| n["id"].as_str().unwrap().to_string()).collect();
    assert_eq!(ids.len(), 3);

    let (status, body) = app.put(&format!("/notifications/{}/read", ids[0]), &author.token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRead"], true);
    let (_, body) = app.get("/notifications/unread/count", &author.token).await;
    assert_eq!(body["count"], 2);

    let (status, body) = app.delete("/notifications/read/clear", &author.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);

    let (status, _) = app.delete(&format!("/notifications/{}", ids[1]), &author.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/notifications/{}", ids[1]), &author.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.put("/notifications/read-all", &author.token, json!({})).await;
    assert_eq!(body["updated"], 1);
    let (_, body) = app.get("/notifications/unread/count", &author.token).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn notifications_belong_to_their_recipient() {
    let app = TestApp::new();
    let author = app.register("target").await;
    let fan = app.register("follower").await;
    app.post(&format!("/users/{}/follow", author.id), &fan.token, json!({})).await;

    let (_, body) = app.get("/notifications", &author.token).await;
    let id = body["items"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app.put(&format!("/notifications/{id}/read"), &fan.token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/notifications/{id}"), &fan.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recipients_can_mute_follow_notifications() {
    let app = TestApp::new();
    let author = app.register("private_person").await;
    let fan = app.register("eager").await;

    let (status, _) = app
        .put(
            "/users/profile",
            &author.token,
            json!({ "settings": { "notifications": { "newFollowers": false } } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post(&format!("/users/{}/follow", author.id), &fan.token, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/notifications/unread/count", &author.token).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn follow_graph() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let (status, body) = app.post(&format!("/users/{}/follow", alice.id), &alice.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot follow yourself");

    let uri = format!("/users/{}/follow", alice.id);
    let (status, _) = app.post(&uri, &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post(&uri, &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Already following this user");

    let (_, followers) = app.get(&format!("/users/{}/followers", alice.id), &bob.token).await;
    assert_eq!(followers[0]["username"], "bob");
    assert!(followers[0].get("email").is_none());
    let (_, following) = app.get(&format!("/users/{}/following", bob.id), &bob.token).await;
    assert_eq!(following[0]["username"], "alice");

    let (status, _) = app.delete(&uri, &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&uri, &bob.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
