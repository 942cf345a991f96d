mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn like_count_matches_the_number_of_likers() {
    let app = TestApp::new();
    let author = app.register("author").await;
    let post = app.create_post(&author, "pr day", "public").await;

    let mut fans = Vec::new();
    for name in ["fan_one", "fan_two", "fan_three"] {
        let fan = app.register(name).await;
        let (status, body) = app.post(&format!("/posts/{post}/like"), &fan.token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["liked"], true);
        fans.push(fan);
    }

    let (_, body) = app.get(&format!("/posts/{post}"), &author.token).await;
    assert_eq!(body["likesCount"], 3);

    // A second toggle takes the like back.
    let (_, body) = app.post(&format!("/posts/{post}/like"), &fans[0].token, json!({})).await;
    assert_eq!(body, json!({ "liked": false, "likesCount": 2 }));

    let (status, _) = app.delete(&format!("/posts/{post}/like"), &fans[0].token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.delete(&format!("/posts/{post}/like"), &fans[1].token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "liked": false, "likesCount": 1 }));
}

#[tokio::test]
async fn feed_respects_privacy_levels() {
    let app = TestApp::new();
    let author = app.register("poster").await;
    let reader = app.register("reader").await;

    app.create_post(&author, "everyone", "public").await;
    app.create_post(&author, "friends", "followers").await;
    let private = app.create_post(&author, "diary", "private").await;

    let contents = |body: &serde_json::Value| -> Vec<String> {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["content"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = app.get("/posts", &author.token).await;
    assert_eq!(contents(&body), ["diary", "friends", "everyone"]);
    assert_eq!(body["pagination"]["total"], 3);

    let (_, body) = app.get("/posts", &reader.token).await;
    assert_eq!(contents(&body), ["everyone"]);

    let (status, _) = app.post(&format!("/users/{}/follow", author.id), &reader.token, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/posts", &reader.token).await;
    assert_eq!(contents(&body), ["friends", "everyone"]);

    let (status, _) = app.get(&format!("/posts/{private}"), &reader.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post(&format!("/posts/{private}/like"), &reader.token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_pages_and_filters_by_type() {
    let app = TestApp::new();
    let author = app.register("chatty").await;
    for i in 0..5 {
        app.create_post(&author, &format!("post {i}"), "public").await;
    }
    let (status, _) = app
        .post("/posts", &author.token, json!({ "content": "how much?", "postType": "question" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/posts?page=2&limit=4", &author.token).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"], json!({ "page": 2, "limit": 4, "total": 6, "pages": 2 }));

    let (_, body) = app.get("/posts?type=question", &author.token).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["postType"], "question");
}

#[tokio::test]
async fn new_posts_inherit_the_author_default_visibility() {
    let app = TestApp::new();
    let author = app.register("shy").await;
    let (status, _) = app
        .put(
            "/users/profile",
            &author.token,
            json!({ "settings": { "privacy": { "postVisibility": "followers" } } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.post("/posts", &author.token, json!({ "content": "quiet" })).await;
    assert_eq!(body["privacyLevel"], "followers");
}

#[tokio::test]
async fn only_the_author_can_edit_or_delete() {
    let app = TestApp::new();
    let author = app.register("owner").await;
    let other = app.register("intruder").await;
    let post = app.create_post(&author, "mine", "public").await;

    let (status, _) = app.put(&format!("/posts/{post}"), &other.token, json!({ "content": "yours" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/posts/{post}"), &other.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.put(&format!("/posts/{post}"), &author.token, json!({ "content": "edited" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "edited");

    let (status, _) = app.delete(&format!("/posts/{post}"), &author.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/posts/{post}"), &author.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_keep_the_counter_in_step() {
    let app = TestApp::new();
    let author = app.register("writer").await;
    let reader = app.register("critic").await;
    let post = app.create_post(&author, "thoughts?", "public").await;

    let (status, comment) = app
        .post(&format!("/posts/{post}/comments"), &reader.token, json!({ "content": "nice" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().unwrap();

    let (status, _) = app.post(&format!("/posts/{post}/comments"), &reader.token, json!({ "content": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&format!("/posts/{post}"), &author.token).await;
    assert_eq!(body["commentsCount"], 1);
    let (_, comments) = app.get(&format!("/posts/{post}/comments"), &author.token).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let uri = format!("/posts/{post}/comments/{comment_id}");
    let (status, _) = app.delete(&uri, &author.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &reader.token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/posts/{post}"), &author.token).await;
    assert_eq!(body["commentsCount"], 0);
}

#[tokio::test]
async fn oversized_or_malformed_posts_are_rejected() {
    let app = TestApp::new();
    let author = app.register("verbose").await;

    let (status, body) = app.post("/posts", &author.token, json!({ "content": "x".repeat(5001) })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");

    let (status, body) = app.post("/posts", &author.token, json!({ "content": "ok", "postType": "rant" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Malformed payload");

    let (status, _) = app.get("/posts/not-a-uuid", &author.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
