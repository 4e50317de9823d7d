use academic_db::{sql_params, StoreError};
use academic_host::config::Config;
use academic_host::open_store;

fn config_for(mode: &str, path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.deployment.mode = Some(mode.to_string());
    config.database.path = Some(path.to_string_lossy().into_owned());
    config
}

#[tokio::test]
async fn production_startup_creates_directory_and_serves_queries() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = tmp.path().join("app/data/academic.db");

    let store = open_store(&config_for("production", &db_path)).expect("startup should succeed");
    assert!(db_path.is_file());
    assert!(store.pragma_report().all_applied());

    store
        .execute("CREATE TABLE courses (code TEXT PRIMARY KEY, title TEXT)", sql_params![])
        .await
        .expect("DDL should succeed");
    store
        .execute(
            "INSERT INTO courses VALUES (?1, ?2)",
            sql_params!["CS101", "Intro to Computing"],
        )
        .await
        .expect("insert should succeed");

    let course = store
        .fetch_one("SELECT title FROM courses WHERE code = ?1", sql_params!["CS101"])
        .await
        .expect("query should succeed")
        .expect("course should exist");
    assert_eq!(course.get::<String>("title").expect("title"), "Intro to Computing");

    store.close().await.expect("close should succeed");
}

#[test]
fn startup_over_an_unusable_path_is_fatal() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");

    let err = open_store(&config_for("production", tmp.path())).expect_err("a directory cannot be opened");
    assert!(matches!(err, StoreError::Open { .. }), "unexpected error: {err:?}");
}

#[test]
fn startup_reopens_existing_database() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = tmp.path().join("academic.db");
    let config = config_for("development", &db_path);

    drop(open_store(&config).expect("first startup should succeed"));
    let store = open_store(&config).expect("second startup should succeed");
    assert_eq!(store.path(), db_path);
}
