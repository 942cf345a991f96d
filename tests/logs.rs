mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fields, TestApp};

#[tokio::test]
async fn severity_must_stay_within_one_to_ten() {
    let app = TestApp::new();
    let user = app.register("sensitive").await;

    for severity in [0, 11] {
        let (status, body) = app
            .post("/side-effects", &user.token, json!({ "symptoms": ["acne"], "severity": severity }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fields(&body), ["severity"]);
    }

    let (status, body) = app
        .post(
            "/side-effects",
            &user.token,
            json!({ "symptoms": ["acne", "insomnia"], "severity": 10, "bloodPressureSystolic": 135, "bloodPressureDiastolic": 85 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["severity"], 10);
    assert!(body["recordedAt"].is_string());

    let (status, body) = app
        .post(
            "/side-effects",
            &user.token,
            json!({ "symptoms": [], "severity": 3, "moodRating": 0, "bloodPressureSystolic": 250 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let mut bad = fields(&body);
    bad.sort();
    assert_eq!(bad, ["bloodPressureSystolic", "moodRating", "symptoms"]);
}

#[tokio::test]
async fn logs_may_only_reference_own_cycles() {
    let app = TestApp::new();
    let owner = app.register("owner").await;
    let other = app.register("borrower").await;
    let compound = app.compound_id("Testosterone Cypionate").await;

    let (_, cycle) = app
        .post("/cycles", &owner.token, json!({ "name": "Cruise", "startDate": "2024-02-01" }))
        .await;
    let cycle_id = cycle["id"].as_str().unwrap();

    let shot = json!({ "cycleId": cycle_id, "compoundId": compound, "dosage": 125.0, "injectionSite": "delt" });
    let (status, _) = app.post("/injections", &other.token, shot.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post("/side-effects", &other.token, json!({ "cycleId": cycle_id, "symptoms": ["bloat"], "severity": 2 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("/injections", &owner.token, shot).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cycleId"], cycle_id);
}

#[tokio::test]
async fn injections_filter_by_cycle_and_survive_cycle_deletion() {
    let app = TestApp::new();
    let user = app.register("logger").await;
    let compound = app.compound_id("Nandrolone Decanoate").await;

    let (_, cycle) = app
        .post("/cycles", &user.token, json!({ "name": "Blast", "startDate": "2024-03-01" }))
        .await;
    let cycle_id = cycle["id"].as_str().unwrap();

    let (status, _) = app
        .post("/injections", &user.token, json!({ "cycleId": cycle_id, "compoundId": compound, "dosage": 200.0, "injectionSite": "glute" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post("/injections", &user.token, json!({ "compoundId": compound, "dosage": 100.0, "injectionSite": "quad" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, all) = app.get("/injections", &user.token).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, filtered) = app.get(&format!("/injections?cycleId={cycle_id}"), &user.token).await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["injectionSite"], "glute");

    let (status, _) = app.delete(&format!("/cycles/{cycle_id}"), &user.token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = app.get("/injections", &user.token).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert!(all.as_array().unwrap().iter().all(|i| i["cycleId"].is_null()));
}

#[tokio::test]
async fn injection_updates_and_deletes_are_owner_only() {
    let app = TestApp::new();
    let user = app.register("pinner").await;
    let other = app.register("meddler").await;
    let compound = app.compound_id("Trenbolone Acetate").await;

    let (status, body) = app
        .post("/injections", &user.token, json!({ "compoundId": compound, "dosage": 0.0, "injectionSite": "delt" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fields(&body), ["dosage"]);

    let (_, shot) = app
        .post("/injections", &user.token, json!({ "compoundId": compound, "dosage": 50.0, "injectionSite": "delt" }))
        .await;
    let uri = format!("/injections/{}", shot["id"].as_str().unwrap());

    let (status, _) = app.put(&uri, &other.token, json!({ "dosage": 75.0 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.put(&uri, &user.token, json!({ "dosage": 75.0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dosage"], 75.0);
    assert_eq!(body["injectionSite"], "delt");

    let (status, _) = app.delete(&uri, &other.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &user.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, &user.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn side_effect_patch_keeps_unset_fields() {
    let app = TestApp::new();
    let user = app.register("tracker").await;

    let (_, effect) = app
        .post("/side-effects", &user.token, json!({ "symptoms": ["night sweats"], "severity": 4, "notes": "week 3" }))
        .await;
    let uri = format!("/side-effects/{}", effect["id"].as_str().unwrap());

    let (status, body) = app.put(&uri, &user.token, json!({ "severity": 6 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["severity"], 6);
    assert_eq!(body["notes"], "week 3");
    assert_eq!(body["symptoms"], json!(["night sweats"]));

    let (status, _) = app.put(&uri, &user.token, json!({ "severity": 12 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
