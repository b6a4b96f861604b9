use chrono::NaiveDate;
use issuevec_core::config::ClickHouseConfig;
use issuevec_core::profile::ConnectionProfile;
use issuevec_core::traits::RowSink;
use issuevec_core::types::OutputRow;
use issuevec_core::Error;
use issuevec_sync::ClickHouseClient;
use serde_json::Value;
use wiremock::matchers::{body_string_contains, header, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Call from the blocking pool; the blocking client must not run on a runtime thread.
fn client_for(port: u16) -> ClickHouseClient {
    let profile = ConnectionProfile {
        name: "github".into(),
        host: "127.0.0.1".into(),
        port: 9000,
        username: "reader".into(),
        password: "s3cret".into(),
        database: "gh".into(),
        secure: false,
    };
    let config = ClickHouseConfig { http_port: Some(port), ..ClickHouseConfig::default() };
    ClickHouseClient::new(&profile, &config).expect("client")
}

fn output_row(id: u32) -> OutputRow {
    let ts = NaiveDate::from_ymd_opt(2023, 11, 5).unwrap().and_hms_opt(8, 30, 0).unwrap();
    OutputRow {
        id,
        state: "closed".into(),
        labels: vec!["bug".into(), "st-fixed".into()],
        created_at: ts,
        updated_at: ts,
        composite_vec: vec![0.5, -0.5],
        title: format!("crash {id}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_parses_json_each_row() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"number":101,"title_text":"Crash on merge","created_at":"2023-01-01 10:00:00","updated_at":"2023-02-01 11:00:00","state":"closed","labels":["bug"],"text":"Crash on merge Crash on merge\nsteps"}"#,
        "\n",
        r#"{"number":102,"title_text":"Docs","created_at":"2023-01-02 10:00:00","updated_at":"2023-01-02 10:00:00","state":"open","labels":[],"text":"Docs Docs\n"}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .and(header("X-ClickHouse-User", "reader"))
        .and(header("X-ClickHouse-Key", "s3cret"))
        .and(query_param("database", "gh"))
        .and(body_string_contains("repo_name = 'ClickHouse/ClickHouse'"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let port = server.address().port();
    let rows = tokio::task::spawn_blocking(move || client_for(port).fetch_source_rows("ClickHouse/ClickHouse")).await.unwrap().expect("rows");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, 101);
    assert_eq!(rows[0].title, "Crash on merge");
    assert_eq!(rows[0].updated_at.to_string(), "2023-02-01 11:00:00");
    assert!(rows[1].labels.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_sends_ordered_columns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param(
            "query",
            "INSERT INTO clickcomments (number,state,labels,created_at,updated_at,composite_vec,title) FORMAT JSONEachRow",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let port = server.address().port();
    tokio::task::spawn_blocking(move || client_for(port).insert(&[output_row(1), output_row(2)]))
        .await
        .unwrap()
        .expect("insert");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["number"], 1);
    assert_eq!(first["created_at"], "2023-11-05 08:30:00");
    assert_eq!(first["title"], "crash 1");
    // keys follow insert column order
    assert!(lines[0].starts_with(r#"{"number":1,"state":"closed","labels":"#));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_exception_is_store_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Code: 60. DB::Exception: Table gh.clickcomments does not exist"))
        .mount(&server)
        .await;

    let port = server.address().port();
    let res = tokio::task::spawn_blocking(move || client_for(port).insert(&[output_row(1)])).await.unwrap();
    match res {
        Err(Error::Store(msg)) => assert!(msg.contains("does not exist"), "{msg}"),
        other => panic!("expected store error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_insert_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let port = server.address().port();
    tokio::task::spawn_blocking(move || client_for(port).insert(&[])).await.unwrap().expect("no-op");
}
