use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{create_entry, empty_request, get, json_request, send};

#[tokio::test]
async fn test_category_lifecycle() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_category_lifecycle: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;

    let (status, travel) = send(
        &app.router,
        json_request("POST", "/categories", Some(&token), json!({ "name": "Travel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = travel["id"].as_str().unwrap().to_string();

    // names are unique per owner
    let (status, _) = send(
        &app.router,
        json_request("POST", "/categories", Some(&token), json!({ "name": "Travel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // another owner may reuse it
    let (other, _) = common::register_user(&app.router).await;
    let (status, _) = send(
        &app.router,
        json_request("POST", "/categories", Some(&other), json!({ "name": "Travel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        json_request(
            "PATCH",
            &format!("/categories/{category_id}"),
            Some(&token),
            json!({ "name": "Trips" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Trips");

    // entries reference it, and lose the reference when it goes
    let entry = create_entry(
        &app.router,
        &token,
        &[("date", "2024-05-01"), ("title", "Lisbon"), ("category_id", &category_id)],
    )
    .await;
    assert_eq!(entry["category_id"], category_id.as_str());

    let (_, body) = send(
        &app.router,
        get(&format!("/diary/search?category_id={category_id}"), Some(&token)),
    )
    .await;
    assert_eq!(body["total"], 1);

    let (status, _) = send(
        &app.router,
        empty_request("DELETE", &format!("/categories/{category_id}"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let entry_id = entry["id"].as_str().unwrap();
    let (status, body) = send(&app.router, get(&format!("/diary/{entry_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category_id"], Value::Null);

    let (_, body) = send(&app.router, get("/categories", Some(&token))).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_entry_with_foreign_category_is_rejected() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_entry_with_foreign_category_is_rejected: {e}");
            return;
        }
    };
    let (alice, _) = common::register_user(&app.router).await;
    let (bob, _) = common::register_user(&app.router).await;

    let (_, category) = send(
        &app.router,
        json_request("POST", "/categories", Some(&bob), json!({ "name": "Private" })),
    )
    .await;
    let category_id = category["id"].as_str().unwrap();

    let (status, _) = send(
        &app.router,
        common::multipart_request(
            "POST",
            "/diary",
            &alice,
            &[("date", "2024-05-01"), ("category_id", category_id)],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_lifecycle() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_task_lifecycle: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;
    let entry = create_entry(&app.router, &token, &[("date", "2024-05-01"), ("title", "Plans")]).await;
    let entry_id = entry["id"].as_str().unwrap();

    let (status, task) = send(
        &app.router,
        json_request(
            "POST",
            "/tasks",
            Some(&token),
            json!({ "title": "Book flights", "diary_entry_id": entry_id, "due_date": "2024-05-10" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["completed"], false);
    let task_id = task["id"].as_str().unwrap().to_string();

    let (_, toggled) = send(
        &app.router,
        empty_request("PATCH", &format!("/tasks/{task_id}/toggle"), &token),
    )
    .await;
    assert_eq!(toggled["completed"], true);

    let (_, listed) = send(
        &app.router,
        get(&format!("/tasks?diary_entry_id={entry_id}&completed=true"), Some(&token)),
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/tasks/{task_id}"),
            Some(&token),
            json!({ "title": "Book trains", "priority": "high" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Book trains");
    assert_eq!(updated["priority"], "high");

    let (status, _) = send(
        &app.router,
        json_request("POST", "/tasks", Some(&token), json!({ "title": "x", "priority": "urgent" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // not visible to anyone else
    let (other, _) = common::register_user(&app.router).await;
    let (status, _) = send(&app.router, get(&format!("/tasks/{task_id}"), Some(&other))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        empty_request("DELETE", &format!("/tasks/{task_id}"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
