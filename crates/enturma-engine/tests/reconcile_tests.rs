//! End-to-end reconciliation tests against a mock directory and a live
//! PostgreSQL.
//!
//! Requires a database reachable through `TEST_DATABASE_URL`.
//! Run with: `cargo test -p enturma-engine --features integration --test reconcile_tests`

#![cfg(feature = "integration")]

use serde_json::json;
use sqlx::PgPool;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use enturma_db::StudentMirror;
use enturma_directory::{DirectoryAuth, DirectoryClient};
use enturma_engine::{ReferenceMap, Reconciler, Stage, SyncConfig};

const COORD_EARLY: &str = "f286f842-b8a7-4834-818e-eedea7d5f7c2";

async fn pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a test database");
    let pool = PgPool::connect(&url).await.expect("connect test database");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS students_mirror (
            enrollment_id TEXT NOT NULL,
            school_year INT NOT NULL,
            remote_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            class_section_ids TEXT[] NOT NULL DEFAULT '{}',
            PRIMARY KEY (enrollment_id, school_year)
        )
        ",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS sections_mirror (
            remote_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            coordination_id UUID NOT NULL,
            school_year INT NOT NULL
        )
        ",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

/// Drop mirror rows a previous test run may have left for this year.
async fn reset_mirror(pool: &PgPool, school_year: i32) {
    sqlx::query("DELETE FROM students_mirror WHERE school_year = $1")
        .bind(school_year)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM sections_mirror WHERE school_year = $1")
        .bind(school_year)
        .execute(pool)
        .await
        .unwrap();
}

/// Create a fresh roster fixture table and fill it with the given rows.
async fn seed_roster(pool: &PgPool, view: &str, rows: &[(&str, i32, &str, &str, &str)]) {
    sqlx::query(&format!("DROP TABLE IF EXISTS {view}"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(&format!(
        "CREATE TABLE {view} (unidade TEXT, sit INT, matricula TEXT, nome TEXT, turma TEXT)"
    ))
    .execute(pool)
    .await
    .unwrap();

    for (unidade, sit, matricula, nome, turma) in rows {
        sqlx::query(&format!(
            "INSERT INTO {view} (unidade, sit, matricula, nome, turma) VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(unidade)
        .bind(sit)
        .bind(matricula)
        .bind(nome)
        .bind(turma)
        .execute(pool)
        .await
        .unwrap();
    }
}

fn reference() -> ReferenceMap {
    let mut reference = ReferenceMap::default();
    reference.insert_unit("01", "Bento Ribeiro");
    reference.insert_coordination("Bento Ribeiro", Stage::EarlyYears, COORD_EARLY.parse().unwrap());
    reference
}

fn config(school_year: i32, view: &str) -> SyncConfig {
    SyncConfig {
        school_year,
        roster_view: view.to_string(),
        min_class_code: 1,
        retry: enturma_engine::RetrySettings {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
        ..SyncConfig::default()
    }
}

fn reconciler(server: &MockServer, pool: PgPool, school_year: i32, view: &str) -> Reconciler {
    let client = DirectoryClient::with_http_client(
        server.uri(),
        DirectoryAuth::token("test-token"),
        reqwest::Client::new(),
    );
    Reconciler::new(client, pool, reference(), config(school_year, view))
}

async fn mock_sections_page(server: &MockServer, school_year: i32, sections: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/classes/"))
        .and(query_param("school_year", school_year.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": sections, "next": null })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_new_student_is_created_and_enrolled() {
    let pool = pool().await;
    let year = 3001;
    reset_mirror(&pool, year).await;
    seed_roster(
        &pool,
        "roster_e2e_create",
        &[("01", 1, "300100001", "Ana Souza", "1155")],
    )
    .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [], "next": null })),
        )
        .mount(&server)
        .await;
    mock_sections_page(
        &server,
        year,
        json!([{ "id": "c-1", "name": "1155", "coordination": COORD_EARLY, "school_year": year }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "s-1",
            "name": "Ana Souza",
            "enrollment_number": "300100001",
            "email": "300100001@alunos.smrede.com.br",
            "is_active": true,
            "classes": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/students/s-1/set_classes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let summary = reconciler(&server, pool.clone(), year, "roster_e2e_create")
        .run()
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.sections_assigned, 1);
    assert_eq!(summary.total_failed(), 0);

    let rows = StudentMirror::list_by_year(&pool, year).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].remote_id, "s-1");
    assert!(rows[0].active);
    assert_eq!(rows[0].class_section_ids, ["c-1"]);
}

#[tokio::test]
async fn test_second_run_issues_zero_mutations() {
    let pool = pool().await;
    let year = 3002;
    reset_mirror(&pool, year).await;
    seed_roster(
        &pool,
        "roster_e2e_idem",
        &[("01", 1, "300200001", "Bruno Lima", "1155")],
    )
    .await;

    let server = MockServer::start().await;
    // Directory already converged: student exists, active, enrolled.
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "s-2",
                "name": "Bruno Lima",
                "enrollment_number": "300200001",
                "email": "300200001@alunos.smrede.com.br",
                "is_active": true,
                "classes": [{"id": "c-1"}]
            }],
            "next": null
        })))
        .mount(&server)
        .await;
    mock_sections_page(
        &server,
        year,
        json!([{ "id": "c-1", "name": "1155", "coordination": COORD_EARLY, "school_year": year }]),
    )
    .await;
    // Any mutation reaching the directory fails the test.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let summary = reconciler(&server, pool.clone(), year, "roster_e2e_idem")
        .run()
        .await
        .unwrap();

    assert_eq!(summary.remote_mutations(), 0);
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn test_withdrawn_student_is_disabled_only() {
    let pool = pool().await;
    let year = 3003;
    reset_mirror(&pool, year).await;
    seed_roster(
        &pool,
        "roster_e2e_withdraw",
        &[("01", 2, "300300001", "Carla Dias", "1155")],
    )
    .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "s-3",
                "name": "Carla Dias",
                "enrollment_number": "300300001",
                "email": "300300001@alunos.smrede.com.br",
                "is_active": true,
                "classes": [{"id": "c-1"}]
            }],
            "next": null
        })))
        .mount(&server)
        .await;
    mock_sections_page(
        &server,
        year,
        json!([{ "id": "c-1", "name": "1155", "coordination": COORD_EARLY, "school_year": year }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/students/s-3/disable/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let summary = reconciler(&server, pool.clone(), year, "roster_e2e_withdraw")
        .run()
        .await
        .unwrap();

    assert_eq!(summary.deactivated, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.sections_assigned, 0);

    let rows = StudentMirror::list_by_year(&pool, year).await.unwrap();
    assert!(!rows[0].active);
}

#[tokio::test]
async fn test_duplicate_create_recovers_through_requery() {
    let pool = pool().await;
    let year = 3004;
    reset_mirror(&pool, year).await;
    seed_roster(
        &pool,
        "roster_e2e_dup",
        &[("01", 1, "300400001", "Davi Rocha", "1155")],
    )
    .await;

    let server = MockServer::start().await;
    // The snapshot listing misses the student (stale view)...
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [], "next": null })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // ...but the record exists, so the re-query after the 400 finds it.
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "s-4",
                "name": "Davi R.",
                "enrollment_number": "300400001",
                "email": "300400001@alunos.smrede.com.br",
                "is_active": true,
                "classes": []
            }],
            "next": null
        })))
        .mount(&server)
        .await;
    mock_sections_page(
        &server,
        year,
        json!([{ "id": "c-1", "name": "1155", "coordination": COORD_EARLY, "school_year": year }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "enrollment_number": ["student with this enrollment number already exists."]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/students/s-4/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/students/s-4/set_classes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let summary = reconciler(&server, pool.clone(), year, "roster_e2e_dup")
        .run()
        .await
        .unwrap();

    // The record is recovered, corrected, and enrolled instead of failing.
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.sections_assigned, 1);
    assert_eq!(summary.total_failed(), 0);

    let rows = StudentMirror::list_by_year(&pool, year).await.unwrap();
    let row = rows.iter().find(|r| r.enrollment_id == "300400001").unwrap();
    assert_eq!(row.remote_id, "s-4");
    assert_eq!(row.name, "Davi Rocha");
    assert_eq!(row.class_section_ids, ["c-1"]);
}

#[tokio::test]
async fn test_later_duplicate_roster_rows_are_skipped() {
    let pool = pool().await;
    let year = 3005;
    reset_mirror(&pool, year).await;
    seed_roster(
        &pool,
        "roster_e2e_dup_rows",
        &[
            ("01", 1, "300500001", "Elisa Melo", "1155"),
            ("01", 1, "300500001", "Elisa Melo", "1156"),
        ],
    )
    .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "s-5",
                "name": "Elisa Melo",
                "enrollment_number": "300500001",
                "email": "300500001@alunos.smrede.com.br",
                "is_active": true,
                "classes": []
            }],
            "next": null
        })))
        .mount(&server)
        .await;
    mock_sections_page(&server, year, json!([])).await;

    let summary = reconciler(&server, pool.clone(), year, "roster_e2e_dup_rows")
        .run()
        .await
        .unwrap();

    assert_eq!(summary.records_processed, 2);
    assert_eq!(summary.skipped.get("duplicate_roster"), Some(&1));
    // Only the first occurrence was reconciled.
    assert_eq!(summary.section_pending, 1);
}
