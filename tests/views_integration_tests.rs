use axum::http::StatusCode;
use serde_json::Value;

mod common;
use common::{create_entry, get, send};

fn entry_titles(body: &Value) -> Vec<String> {
    body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_daily_weekly_monthly_windows() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_daily_weekly_monthly_windows: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;

    // 2024-01-15 is a Monday
    create_entry(&app.router, &token, &[("date", "2024-01-14"), ("title", "Sunday before")]).await;
    create_entry(&app.router, &token, &[("date", "2024-01-15"), ("title", "Monday")]).await;
    create_entry(&app.router, &token, &[("date", "2024-01-21"), ("title", "Sunday")]).await;
    create_entry(&app.router, &token, &[("date", "2024-02-01"), ("title", "February")]).await;

    let (status, body) = send(&app.router, get("/diary?view=daily&date=2024-01-15", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry_titles(&body), vec!["Monday"]);

    let (_, body) = send(&app.router, get("/diary?view=weekly&date=2024-01-17", Some(&token))).await;
    assert_eq!(body["window"]["start"], "2024-01-15");
    assert_eq!(body["window"]["end"], "2024-01-21");
    assert_eq!(entry_titles(&body), vec!["Sunday", "Monday"]);
    assert_eq!(body["day_counts"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app.router, get("/diary?view=monthly&date=2024-01-31", Some(&token))).await;
    assert_eq!(body["total"], 3);
    assert!(body.get("months").is_none());

    // no view lists everything
    let (_, body) = send(&app.router, get("/diary", Some(&token))).await;
    assert_eq!(body["total"], 4);

    let (status, _) = send(&app.router, get("/diary?view=hourly", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_yearly_view_summarises_months() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_yearly_view_summarises_months: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;

    create_entry(&app.router, &token, &[("date", "2024-03-02"), ("mood", "calm")]).await;
    create_entry(&app.router, &token, &[("date", "2024-03-09"), ("mood", "tired")]).await;
    create_entry(&app.router, &token, &[("date", "2024-03-20"), ("mood", "tired")]).await;
    create_entry(&app.router, &token, &[("date", "2023-12-31"), ("mood", "calm")]).await;

    let (_, body) = send(&app.router, get("/diary?view=yearly&date=2024-06-01", Some(&token))).await;
    assert_eq!(body["total"], 3);

    let months = body["months"].as_array().unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[2]["month"], "2024-03");
    assert_eq!(months[2]["count"], 3);
    assert_eq!(months[2]["dominant_mood"], "tired");
    assert_eq!(months[0]["count"], 0);
    assert_eq!(months[0]["dominant_mood"], Value::Null);
}

#[tokio::test]
async fn test_timeline_cursor_walks_every_entry() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_timeline_cursor_walks_every_entry: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;

    for (date, title) in [
        ("2024-01-05", "a"),
        ("2024-01-20", "b"),
        ("2024-02-03", "c"),
        ("2024-02-03", "d"),
        ("2024-03-11", "e"),
    ] {
        create_entry(&app.router, &token, &[("date", date), ("title", title)]).await;
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let uri = match &cursor {
            Some(c) => format!("/diary/timeline?limit=2&cursor={c}"),
            None => "/diary/timeline?limit=2".to_string(),
        };
        let (status, body) = send(&app.router, get(&uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        pages += 1;

        for group in body["groups"].as_array().unwrap() {
            let month = group["month"].as_str().unwrap();
            for item in group["items"].as_array().unwrap() {
                assert!(item["date"].as_str().unwrap().starts_with(month));
                seen.push(item["title"].as_str().unwrap().to_string());
            }
        }

        if body["has_more"] == false {
            assert_eq!(body["next_cursor"], Value::Null);
            break;
        }
        cursor = Some(body["next_cursor"].as_str().unwrap().to_string());
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], "e");
    assert_eq!(seen[4], "a");
    // same-day entries keep creation order, newest first
    assert_eq!(&seen[1..3], &["d".to_string(), "c".to_string()]);

    let (status, _) = send(&app.router, get("/diary/timeline?cursor=garbage", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_overview() {
    let app = match common::setup_test_app().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Skipping test_stats_overview: {e}");
            return;
        }
    };
    let (token, _) = common::register_user(&app.router).await;

    create_entry(&app.router, &token, &[("date", "2024-01-02"), ("mood", "happy"), ("tags", "work")]).await;
    create_entry(&app.router, &token, &[("date", "2024-01-09"), ("mood", "happy"), ("tags", "Work, gym")]).await;
    create_entry(&app.router, &token, &[("date", "2024-02-01"), ("mood", "sad")]).await;

    let (status, body) = send(&app.router, get("/diary/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 3);
    assert_eq!(body["most_common_mood"], "happy");
    assert_eq!(body["tag_frequency"][0]["value"], "work");
    assert_eq!(body["tag_frequency"][0]["count"], 2);
    assert_eq!(body["entries_by_month"].as_array().unwrap().len(), 2);
}
