//! Marketplace end-to-end tests over the in-process router.
//!
//! Each test registers its own accounts against a fresh in-memory database:
//!   - profiles: update own, browse professionals with filters, company view
//!   - jobs: CRUD, ownership, open-job quota per plan
//!   - matching: ranking for a job and for a professional
//!   - forum: threads, replies, cascade delete
//!   - resources: publish, filter, ownership
//!   - subscription + admin panel: plan changes, user status/role, audit log

mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::*;

async fn create_job(app: &Router, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, "/api/v1/jobs", Some(token), Some(body)).await
}

fn job_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Design and deliver a blended onboarding program.",
        "category": "Leadership",
        "required_skills": ["Facilitation", "LMS"],
        "budget_min": 50.0,
        "budget_max": 100.0,
        "remote": true,
    })
}

/// The audit writer is fire-and-forget; poll until the entry lands.
async fn wait_for_audit(app: &Router, admin_token: &str, action: &str) -> Value {
    for _ in 0..40 {
        let (_, body) = send(
            app,
            Method::GET,
            &format!("/api/v1/admin/audit-log?action={}", action),
            Some(admin_token),
            None,
        )
        .await;
        if body["total"].as_i64().unwrap_or(0) > 0 {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("no audit entry for action '{}'", action);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Profiles
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_professional_updates_own_profile() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "ana@example.com", "Ana", "professional").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/profile",
        Some(&pro.token),
        Some(json!({
            "name": "Ana Lopez",
            "headline": "  Instructional   <b>Designer</b> ",
            "skills": ["LMS", "lms", "Facilitation"],
            "expertise_areas": ["Leadership"],
            "hourly_rate": 85.0,
            "location": "Madrid",
            "portfolio_url": "https://ana.example.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Ana Lopez");
    assert_eq!(body["headline"], "Instructional Designer");
    assert_eq!(body["skills"], json!(["LMS", "Facilitation"]));
    assert_eq!(body["hourly_rate"], 85.0);

    // Fields not sent are kept
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/profile",
        Some(&pro.token),
        Some(json!({"bio": "Ten years in corporate learning."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "Madrid");
    assert_eq!(body["bio"], "Ten years in corporate learning.");

    let (status, body) = send(&app, Method::GET, "/api/v1/profile", Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["portfolio_url"], "https://ana.example.com");
}

#[tokio::test]
async fn test_profile_update_validation() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "val@example.com", "Val", "professional").await;

    for bad in [
        json!({"hourly_rate": -5.0}),
        json!({"years_experience": 200}),
        json!({"portfolio_url": "ftp://files.example.com"}),
        json!({"name": "   "}),
    ] {
        let (status, _) = send(&app, Method::PUT, "/api/v1/profile", Some(&pro.token), Some(bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", bad);
    }
}

#[tokio::test]
async fn test_company_updates_own_profile() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "team@globex.com", "Globex", "company").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/profile",
        Some(&co.token),
        Some(json!({"company_name": "Globex Corp", "industry": "Energy", "website": "https://globex.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["company_name"], "Globex Corp");
    assert_eq!(body["industry"], "Energy");

    let pro = register(&app, "look@example.com", "Look", "professional").await;
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/companies/{}", co.id),
        Some(&pro.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company_name"], "Globex Corp");
    assert_eq!(body["open_jobs"], 0);
}

#[tokio::test]
async fn test_admin_has_no_marketplace_profile() {
    let (app, _) = build_test_app().await;
    let admin = login_admin(&app).await;

    let (status, _) = send(&app, Method::GET, "/api/v1/profile", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, me) = send(&app, Method::GET, "/api/v1/auth/me", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(me["profile"].is_null());
}

#[tokio::test]
async fn test_browse_professionals_with_filters() {
    let (app, _) = build_test_app().await;
    let a = register(&app, "a@example.com", "Alice", "professional").await;
    let b = register(&app, "b@example.com", "Bob", "professional").await;
    let co = register(&app, "co@example.com", "Co", "company").await;

    send(&app, Method::PUT, "/api/v1/profile", Some(&a.token),
        Some(json!({"skills": ["Coaching", "LMS"], "location": "Berlin", "headline": "Leadership coach"}))).await;
    send(&app, Method::PUT, "/api/v1/profile", Some(&b.token),
        Some(json!({"skills": ["Excel"], "location": "Lisbon", "headline": "Data trainer"}))).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/professionals", Some(&co.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = send(&app, Method::GET, "/api/v1/professionals?skill=lms", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["user_id"], a.id.as_str());

    let (_, body) = send(&app, Method::GET, "/api/v1/professionals?location=lisb", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["user_id"], b.id.as_str());

    let (_, body) = send(&app, Method::GET, "/api/v1/professionals?q=coach", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/professionals?per_page=1&page=2", Some(&co.token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["page"], 2);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/professionals/{}", b.id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bob");

    let (status, _) = send(&app, Method::GET, "/api/v1/professionals/missing", Some(&co.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_job_crud_and_ownership() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "jobs@acme.io", "Acme", "company").await;
    let other = register(&app, "jobs@rival.io", "Rival", "company").await;
    let pro = register(&app, "seek@example.com", "Seeker", "professional").await;

    let (status, job) = create_job(&app, &co.token, job_body("LMS rollout lead")).await;
    assert_eq!(status, StatusCode::OK, "{}", job);
    assert_eq!(job["status"], "open");
    assert_eq!(job["company_name"], "Acme");
    assert_eq!(job["remote"], true);
    let id = job["id"].as_str().unwrap().to_string();

    let (status, _) = create_job(&app, &pro.token, job_body("Not allowed")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}", id), Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["required_skills"], json!(["Facilitation", "LMS"]));

    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/jobs/{}", id), Some(&other.token),
        Some(json!({"title": "Hijacked"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/jobs/{}", id), Some(&co.token),
        Some(json!({"title": "LMS migration lead", "status": "closed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "LMS migration lead");
    assert_eq!(body["status"], "closed");
    assert_eq!(body["budget_max"], 100.0);

    // Closed jobs drop out of the default listing
    let (_, body) = send(&app, Method::GET, "/api/v1/jobs", Some(&pro.token), None).await;
    assert_eq!(body["total"], 0);
    let (_, body) = send(&app, Method::GET, "/api/v1/jobs?status=all", Some(&pro.token), None).await;
    assert_eq!(body["total"], 1);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/jobs/{}", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, Method::GET, &format!("/api/v1/jobs/{}", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_job_validation() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "v@acme.io", "Acme", "company").await;

    let mut body = job_body("Bad budget");
    body["budget_min"] = json!(500.0);
    let (status, _) = create_job(&app, &co.token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = job_body("   ");
    body["budget_min"] = json!(null);
    let (status, _) = create_job(&app, &co.token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/v1/jobs?status=archived", Some(&co.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_list_filters() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "f@acme.io", "Acme", "company").await;
    let other = register(&app, "f@rival.io", "Rival", "company").await;

    create_job(&app, &co.token, job_body("Remote facilitator")).await;
    let mut onsite = job_body("Onsite coach");
    onsite["remote"] = json!(false);
    onsite["category"] = json!("Coaching");
    create_job(&app, &other.token, onsite).await;

    let (_, body) = send(&app, Method::GET, "/api/v1/jobs?remote=true", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["title"], "Remote facilitator");

    let (_, body) = send(&app, Method::GET, "/api/v1/jobs?category=coaching", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/jobs?q=facil", Some(&co.token), None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/jobs?company_id={}", other.id), Some(&co.token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["title"], "Onsite coach");
}

#[tokio::test]
async fn test_free_plan_open_job_quota() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "quota@acme.io", "Acme", "company").await;
    let admin = login_admin(&app).await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let (status, job) = create_job(&app, &co.token, job_body(&format!("Job {}", i))).await;
        assert_eq!(status, StatusCode::OK);
        ids.push(job["id"].as_str().unwrap().to_string());
    }

    let (status, body) = create_job(&app, &co.token, job_body("One too many")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("free"));

    // Closing one frees a slot; reopening it while full is refused
    send(&app, Method::PUT, &format!("/api/v1/jobs/{}", ids[0]), Some(&co.token), Some(json!({"status": "closed"}))).await;
    let (status, _) = create_job(&app, &co.token, job_body("Replacement")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/jobs/{}", ids[0]), Some(&co.token),
        Some(json!({"status": "open"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // An upgrade lifts the limit
    let end = (Utc::now() + Duration::days(30)).to_rfc3339();
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/admin/users/{}/subscription", co.id),
        Some(&admin.token),
        Some(json!({"plan": "pro", "status": "active", "current_period_end": end})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = create_job(&app, &co.token, job_body("After upgrade")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, sub) = send(&app, Method::GET, "/api/v1/subscription", Some(&co.token), None).await;
    assert_eq!(sub["effective_plan"], "pro");
    assert_eq!(sub["open_jobs"], 4);
    assert_eq!(sub["open_job_quota"], 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_respect_quota() {
    let (app, state, path) = build_file_backed_app().await;
    let co = register(&app, "rush@acme.io", "Rush", "company").await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let app = app.clone();
        let token = co.token.clone();
        handles.push(tokio::spawn(async move {
            create_job(&app, &token, job_body(&format!("Rush {}", i))).await.0
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => accepted += 1,
            StatusCode::FORBIDDEN => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(accepted, 3);

    let (_, sub) = send(&app, Method::GET, "/api/v1/subscription", Some(&co.token), None).await;
    assert_eq!(sub["open_jobs"], 3);

    state.db.close().await;
    remove_db(&path);
}

#[tokio::test]
async fn test_admin_moderates_jobs_with_audit() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "mod@acme.io", "Acme", "company").await;
    let admin = login_admin(&app).await;

    let (_, job) = create_job(&app, &co.token, job_body("Spam posting")).await;
    let id = job["id"].as_str().unwrap();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/jobs/{}", id), Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let log = wait_for_audit(&app, &admin.token, "delete").await;
    assert_eq!(log["data"][0]["resource"], "job");
    assert_eq!(log["data"][0]["resource_id"], id);
    assert_eq!(log["data"][0]["email"], ADMIN_EMAIL);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_matches_for_job_are_ranked() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "m@acme.io", "Acme", "company").await;
    let strong = register(&app, "strong@example.com", "Strong", "professional").await;
    let weak = register(&app, "weak@example.com", "Weak", "professional").await;

    send(&app, Method::PUT, "/api/v1/profile", Some(&strong.token), Some(json!({
        "skills": ["facilitation", "lms", "Coaching"],
        "expertise_areas": ["leadership"],
        "hourly_rate": 80.0,
    }))).await;
    send(&app, Method::PUT, "/api/v1/profile", Some(&weak.token), Some(json!({"skills": ["Excel"]}))).await;

    let (_, job) = create_job(&app, &co.token, job_body("Leadership academy")).await;
    let id = job["id"].as_str().unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["total"], 2);

    let first = &body["data"][0];
    assert_eq!(first["professional"]["user_id"], strong.id.as_str());
    assert_eq!(first["score"], 100);
    assert_eq!(first["score_display"], "100%");
    assert_eq!(first["missing_skills"], json!([]));

    // Weak: no skills or expertise, unknown rate, remote job = 0.05 + 0.1
    let second = &body["data"][1];
    assert_eq!(second["professional"]["user_id"], weak.id.as_str());
    assert_eq!(second["score"], 15);
    assert_eq!(second["missing_skills"], json!(["Facilitation", "LMS"]));

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches?min_score=50", id), Some(&co.token), None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches?limit=1", id), Some(&co.token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches?min_score=101", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches?limit=100", id), Some(&co.token), None).await;
    assert_eq!(body["total"], 2);
    for limit in ["0", "101"] {
        let (status, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}/matches?limit={}", id, limit),
            Some(&co.token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit={}", limit);
        assert!(body["error"].as_str().unwrap().contains("between 1 and 100"));
    }
}

#[tokio::test]
async fn test_job_matches_restricted_to_owner() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "own@acme.io", "Acme", "company").await;
    let rival = register(&app, "own@rival.io", "Rival", "company").await;
    let pro = register(&app, "peek@example.com", "Peek", "professional").await;
    let admin = login_admin(&app).await;

    let (_, job) = create_job(&app, &co.token, job_body("Private")).await;
    let uri = format!("/api/v1/jobs/{}/matches", job["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some(&rival.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, &uri, Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_recommended_jobs_for_professional() {
    let (app, _) = build_test_app().await;
    let co = register(&app, "rec@acme.io", "Acme", "company").await;
    let pro = register(&app, "rec@example.com", "Rec", "professional").await;

    send(&app, Method::PUT, "/api/v1/profile", Some(&pro.token), Some(json!({
        "skills": ["Facilitation"],
        "location": "Paris",
    }))).await;

    let (_, good) = create_job(&app, &co.token, job_body("Good fit")).await;
    let mut far = job_body("Far away");
    far["remote"] = json!(false);
    far["location"] = json!("Tokyo");
    far["required_skills"] = json!(["Excel"]);
    create_job(&app, &co.token, far).await;
    let (_, closed) = create_job(&app, &co.token, job_body("Closed")).await;
    send(&app, Method::PUT, &format!("/api/v1/jobs/{}", closed["id"].as_str().unwrap()), Some(&co.token),
        Some(json!({"status": "closed"}))).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/matches", Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["job"]["id"], good["id"]);
    assert_eq!(body["data"][0]["matched_skills"], json!(["Facilitation"]));

    let (status, _) = send(&app, Method::GET, "/api/v1/matches", Some(&co.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Forum
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_forum_thread_with_replies() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "talk@example.com", "Talker", "professional").await;
    let co = register(&app, "talk@acme.io", "Acme", "company").await;

    let (status, post) = send(&app, Method::POST, "/api/v1/forum/posts", Some(&pro.token), Some(json!({
        "title": "Best LMS for small teams?",
        "content": "Looking for <script>x</script>recommendations.\nBudget is tight.",
        "category": "Tools",
    }))).await;
    assert_eq!(status, StatusCode::OK, "{}", post);
    assert_eq!(post["content"], "Looking for xrecommendations.\nBudget is tight.");
    let id = post["id"].as_str().unwrap().to_string();

    let (status, first) = send(&app, Method::POST, &format!("/api/v1/forum/posts/{}/replies", id), Some(&co.token),
        Some(json!({"content": "We use Moodle."}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["parent_id"], id.as_str());
    assert_eq!(first["category"], "Tools");
    send(&app, Method::POST, &format!("/api/v1/forum/posts/{}/replies", id), Some(&pro.token),
        Some(json!({"content": "Thanks!"}))).await;

    // Replies are one level deep
    let (status, _) = send(&app, Method::POST,
        &format!("/api/v1/forum/posts/{}/replies", first["id"].as_str().unwrap()),
        Some(&pro.token), Some(json!({"content": "nested"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, thread) = send(&app, Method::GET, &format!("/api/v1/forum/posts/{}", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["post"]["reply_count"], 2);
    assert_eq!(thread["replies"][0]["content"], "We use Moodle.");
    assert_eq!(thread["replies"][1]["content"], "Thanks!");

    let (_, list) = send(&app, Method::GET, "/api/v1/forum/posts", Some(&co.token), None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"][0]["reply_count"], 2);

    let (_, list) = send(&app, Method::GET, "/api/v1/forum/posts?category=tools", Some(&co.token), None).await;
    assert_eq!(list["total"], 1);
    let (_, list) = send(&app, Method::GET, "/api/v1/forum/posts?category=news", Some(&co.token), None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_forum_edit_and_delete_permissions() {
    let (app, state) = build_test_app().await;
    let author = register(&app, "author@example.com", "Author", "professional").await;
    let stranger = register(&app, "stranger@example.com", "Stranger", "professional").await;

    let (_, post) = send(&app, Method::POST, "/api/v1/forum/posts", Some(&author.token),
        Some(json!({"title": "Hello", "content": "First post"}))).await;
    let id = post["id"].as_str().unwrap().to_string();
    send(&app, Method::POST, &format!("/api/v1/forum/posts/{}/replies", id), Some(&stranger.token),
        Some(json!({"content": "Welcome"}))).await;

    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/forum/posts/{}", id), Some(&stranger.token),
        Some(json!({"content": "Defaced"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/forum/posts/{}", id), Some(&author.token),
        Some(json!({"content": "Edited post"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Edited post");
    assert_eq!(body["title"], "Hello");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/forum/posts/{}", id), Some(&stranger.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/forum/posts/{}", id), Some(&author.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies_deleted"], 1);

    let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM forum_posts")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_resource_hub() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "share@example.com", "Sharer", "professional").await;
    let co = register(&app, "read@acme.io", "Acme", "company").await;

    let (status, _) = send(&app, Method::POST, "/api/v1/resources", Some(&co.token),
        Some(json!({"title": "Ours", "type": "article"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, "/api/v1/resources", Some(&pro.token),
        Some(json!({"title": "Bad type", "type": "meme"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/v1/resources", Some(&pro.token),
        Some(json!({"title": "Bad url", "type": "video", "url": "javascript:alert(1)"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, res) = send(&app, Method::POST, "/api/v1/resources", Some(&pro.token), Some(json!({
        "title": "Kirkpatrick model template",
        "description": "Evaluation worksheet",
        "category": "Evaluation",
        "type": "Template",
        "url": "https://example.com/kirkpatrick.xlsx",
        "tags": ["evaluation", "ROI"],
    }))).await;
    assert_eq!(status, StatusCode::OK, "{}", res);
    assert_eq!(res["type"], "template");
    assert_eq!(res["author_name"], "Sharer");
    let id = res["id"].as_str().unwrap().to_string();

    send(&app, Method::POST, "/api/v1/resources", Some(&pro.token),
        Some(json!({"title": "Podcast episode", "type": "podcast", "tags": ["coaching"]}))).await;

    let (_, list) = send(&app, Method::GET, "/api/v1/resources", Some(&co.token), None).await;
    assert_eq!(list["total"], 2);
    let (_, list) = send(&app, Method::GET, "/api/v1/resources?type=template", Some(&co.token), None).await;
    assert_eq!(list["total"], 1);
    let (_, list) = send(&app, Method::GET, "/api/v1/resources?tag=roi", Some(&co.token), None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"][0]["id"], id.as_str());
    let (_, list) = send(&app, Method::GET, "/api/v1/resources?q=worksheet", Some(&co.token), None).await;
    assert_eq!(list["total"], 1);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/resources/{}", id), Some(&pro.token),
        Some(json!({"tags": ["evaluation"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["evaluation"]));
    assert_eq!(body["type"], "template");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/resources/{}", id), Some(&co.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/resources/{}", id), Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/resources/{}", id), Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subscription
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_admin_sets_subscription() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "sub@example.com", "Sub", "professional").await;
    let admin = login_admin(&app).await;
    let uri = format!("/api/v1/admin/users/{}/subscription", pro.id);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&pro.token),
        Some(json!({"plan": "enterprise", "status": "active"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&admin.token),
        Some(json!({"plan": "pro", "status": "active", "current_period_end": "next week"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let lapsed = (Utc::now() - Duration::days(1)).to_rfc3339();
    let (status, body) = send(&app, Method::PUT, &uri, Some(&admin.token),
        Some(json!({"plan": "pro", "status": "active", "current_period_end": lapsed}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["is_active"], false);
    assert_eq!(body["effective_plan"], "free");

    let (status, body) = send(&app, Method::PUT, &uri, Some(&admin.token),
        Some(json!({"plan": "pro", "status": "trialing", "current_period_end": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    let (_, own) = send(&app, Method::GET, "/api/v1/subscription", Some(&pro.token), None).await;
    assert_eq!(own["status"], "trialing");
    assert_eq!(own["effective_plan"], "pro");
    assert!(own["features"].as_array().unwrap().contains(&json!("matching")));

    let (status, _) = send(&app, Method::PUT, "/api/v1/admin/users/nobody/subscription", Some(&admin.token),
        Some(json!({"plan": "pro", "status": "active"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let log = wait_for_audit(&app, &admin.token, "update").await;
    assert_eq!(log["data"][0]["resource"], "subscription");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Admin panel
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let (app, _) = build_test_app().await;
    let pro = register(&app, "nosy@example.com", "Nosy", "professional").await;

    for uri in ["/api/v1/admin/stats", "/api/v1/admin/users", "/api/v1/admin/audit-log"] {
        let (status, _) = send(&app, Method::GET, uri, Some(&pro.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_admin_stats_and_user_list() {
    let (app, _) = build_test_app().await;
    let admin = login_admin(&app).await;
    register(&app, "p1@example.com", "Pia", "professional").await;
    register(&app, "p2@example.com", "Paul", "professional").await;
    let co = register(&app, "c1@acme.io", "Acme", "company").await;
    create_job(&app, &co.token, job_body("Counted")).await;

    let (status, stats) = send(&app, Method::GET, "/api/v1/admin/stats", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"]["total"], 4);
    assert_eq!(stats["users"]["by_role"]["professional"], 2);
    assert_eq!(stats["jobs"]["open"], 1);
    assert_eq!(stats["subscriptions"]["free"], 3);
    assert_eq!(stats["subscriptions"]["enterprise"], 1);

    let (_, users) = send(&app, Method::GET, "/api/v1/admin/users?role=professional", Some(&admin.token), None).await;
    assert_eq!(users["total"], 2);
    let (_, users) = send(&app, Method::GET, "/api/v1/admin/users?q=acme", Some(&admin.token), None).await;
    assert_eq!(users["total"], 1);
    assert!(users["data"][0].get("password").is_none());

    let (status, _) = send(&app, Method::GET, "/api/v1/admin/users?role=wizard", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivation_ends_sessions() {
    let (app, state) = build_test_app().await;
    let admin = login_admin(&app).await;
    let pro = register(&app, "ban@example.com", "Ban", "professional").await;

    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/status", admin.id),
        Some(&admin.token), Some(json!({"is_active": false}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/status", pro.id),
        Some(&admin.token), Some(json!({"is_active": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::POST, "/api/v1/auth/refresh", None,
        Some(json!({"refresh_token": pro.refresh_token}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Deactivated professionals disappear from browsing
    let (_, list) = send(&app, Method::GET, "/api/v1/professionals", Some(&admin.token), None).await;
    assert_eq!(list["total"], 0);

    let log = wait_for_audit(&app, &admin.token, "deactivate").await;
    assert_eq!(log["data"][0]["resource_id"], pro.id.as_str());
    assert_eq!(log["data"][0]["ip"], "unknown");

    send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/status", pro.id),
        Some(&admin.token), Some(json!({"is_active": true}))).await;
    let again = login(&app, "ban@example.com", PASSWORD).await;
    assert!(state.sessions.verify_access(&again.token).is_ok());
}

#[tokio::test]
async fn test_role_change_revokes_and_creates_profile() {
    let (app, _) = build_test_app().await;
    let admin = login_admin(&app).await;
    let pro = register(&app, "switch@example.com", "Switcher", "professional").await;

    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", admin.id),
        Some(&admin.token), Some(json!({"role": "professional"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", pro.id),
        Some(&admin.token), Some(json!({"role": "company"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "company");

    // Old token carried the old role and is revoked
    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&pro.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = login(&app, "switch@example.com", PASSWORD).await;
    let (status, me) = send(&app, Method::GET, "/api/v1/auth/me", Some(&fresh.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["role"], "company");
    assert_eq!(me["profile"]["company_name"], "Switcher");

    let (status, _) = create_job(&app, &fresh.token, job_body("Now hiring")).await;
    assert_eq!(status, StatusCode::OK);

    let log = wait_for_audit(&app, &admin.token, "update_role").await;
    assert_eq!(log["data"][0]["detail"], "professional -> company");

    // The kept professional row no longer makes the account a candidate
    let hiring = register(&app, "hire@acme.io", "Hiring Co", "company").await;
    let (_, list) = send(&app, Method::GET, "/api/v1/professionals", Some(&hiring.token), None).await;
    assert_eq!(list["total"], 0);
    assert_eq!(list["data"], json!([]));
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/professionals/{}", pro.id),
        Some(&hiring.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, job) = create_job(&app, &hiring.token, job_body("Facilitator wanted")).await;
    let (status, matches) = send(&app, Method::GET,
        &format!("/api/v1/jobs/{}/matches", job["id"].as_str().unwrap()), Some(&hiring.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matches["total"], 0);

    let (status, company) = send(&app, Method::GET, &format!("/api/v1/companies/{}", pro.id),
        Some(&hiring.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(company["company_name"], "Switcher");

    // And back: the company page goes away, the old professional profile returns
    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", pro.id),
        Some(&admin.token), Some(json!({"role": "professional"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/companies/{}", pro.id),
        Some(&hiring.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, profile) = send(&app, Method::GET, &format!("/api/v1/professionals/{}", pro.id),
        Some(&hiring.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Switcher");
}

#[tokio::test]
async fn test_admin_demotes_another_admin() {
    let (app, _) = build_test_app().await;
    let admin = login_admin(&app).await;
    let deputy = register(&app, "deputy@example.com", "Deputy", "professional").await;

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", deputy.id),
        Some(&admin.token), Some(json!({"role": "admin"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let deputy = login(&app, "deputy@example.com", PASSWORD).await;
    let (status, _) = send(&app, Method::GET, "/api/v1/admin/stats", Some(&deputy.token), None).await;
    assert_eq!(status, StatusCode::OK);

    // The deputy may demote the original admin but not themselves
    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", deputy.id),
        Some(&deputy.token), Some(json!({"role": "company"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/admin/users/{}/role", admin.id),
        Some(&deputy.token), Some(json!({"role": "company"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "company");

    let (status, _) = send(&app, Method::GET, "/api/v1/admin/stats", Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
