use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const COACH: i64 = 1;
const RILEY: i64 = 2;
const AVERY: i64 = 3;
const QUINN: i64 = 4;

#[derive(Debug, Deserialize)]
struct Week {
    id: i64,
    week_num: u32,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Dashboard {
    active_week: Week,
    weeks: Vec<Week>,
}

#[derive(Debug, Deserialize)]
struct Completion {
    completed_week: Week,
    next_week: Week,
    warnings: Vec<String>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn seeded_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("speed_form_http_{}_{}.json", std::process::id(), nanos));

    let seed = json!({
        "tables": {
            "athletes": [
                { "id": 1, "name": "Riley", "slug": "riley", "baseline_vo2": 45.0, "target_vo2": 55.0,
                  "hrv_low": 50.0, "hrv_high": 70.0 },
                { "id": 2, "name": "Avery", "slug": "avery" },
                { "id": 3, "name": "Quinn", "slug": "quinn" }
            ],
            "users": [
                { "id": COACH, "email": "coach@example.com", "password_hash": "whistle", "role": "coach" },
                { "id": RILEY, "email": "riley@example.com", "password_hash": "pw1", "role": "athlete", "athlete_id": 1 },
                { "id": AVERY, "email": "avery@example.com", "password_hash": "pw2", "role": "athlete", "athlete_id": 2 },
                { "id": QUINN, "email": "quinn@example.com", "password_hash": "pw3", "role": "athlete", "athlete_id": 3 }
            ]
        }
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&seed).unwrap()).expect("write seed data");
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = seeded_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_speed_form"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env_remove("APP_STORE_URL")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn dashboard(client: &Client, base_url: &str, user: i64, athlete: i64) -> Dashboard {
    client
        .get(format!("{base_url}/api/athletes/{athlete}"))
        .header("x-user-id", user.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn set_field(
    client: &Client,
    base_url: &str,
    user: i64,
    athlete: i64,
    week: i64,
    field: &str,
    value: Value,
) -> reqwest::Response {
    client
        .patch(format!("{base_url}/api/athletes/{athlete}/weeks/{week}"))
        .header("x-user-id", user.to_string())
        .json(&json!({ "field": field, "value": value }))
        .send()
        .await
        .unwrap()
}

async fn complete(client: &Client, base_url: &str, user: i64, athlete: i64, week: i64) -> reqwest::Response {
    client
        .post(format!("{base_url}/api/athletes/{athlete}/weeks/{week}/complete"))
        .header("x-user-id", user.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_login_returns_role_without_password() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/login", server.base_url))
        .json(&json!({ "email": "riley@example.com", "password": "pw1" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["role"], json!("athlete"));
    assert_eq!(user["athlete_id"], json!(1));
    assert!(user.get("password_hash").is_none());

    let response = client
        .post(format!("{}/api/login", server.base_url))
        .json(&json!({ "email": "riley@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_week_cycle_completes_and_rolls_over() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let board = dashboard(&client, base, RILEY, 1).await;
    assert_eq!(board.active_week.week_num, 1);
    assert_eq!(board.active_week.status, "active");
    let week_id = board.active_week.id;

    let response = complete(&client, base, RILEY, 1, week_id).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"], json!(["VO2 MAX", "RESTING HR", "TOTAL VOLUME"]));

    for (field, value) in [("vo2_max", json!("50")), ("resting_hr", json!(105)), ("total_volume", json!(30))] {
        let response = set_field(&client, base, RILEY, 1, week_id, field, value).await;
        assert!(response.status().is_success(), "setting {field} failed");
    }

    let check: Value = client
        .get(format!("{base}/api/athletes/1/weeks/{week_id}/validation"))
        .header("x-user-id", RILEY.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["valid"], json!(true));

    let response = complete(&client, base, RILEY, 1, week_id).await;
    assert!(response.status().is_success());
    let completion: Completion = response.json().await.unwrap();
    assert_eq!(completion.completed_week.status, "completed");
    assert_eq!(completion.next_week.week_num, 2);
    assert_eq!(completion.next_week.status, "active");
    assert_eq!(completion.warnings, vec!["Unusual resting HR: 105 bpm"]);

    let response = complete(&client, base, RILEY, 1, week_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let board = dashboard(&client, base, RILEY, 1).await;
    let active: Vec<_> = board.weeks.iter().filter(|week| week.status == "active").collect();
    assert_eq!(active.len(), 1);
    assert_eq!(board.weeks.len(), 2);
}

#[tokio::test]
async fn http_coach_notes_are_coach_only() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let week_id = dashboard(&client, base, AVERY, 2).await.active_week.id;

    let response = set_field(&client, base, COACH, 2, week_id, "coach_notes", json!("easy week")).await;
    assert!(response.status().is_success());

    let response = set_field(&client, base, AVERY, 2, week_id, "coach_notes", json!("x")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = set_field(&client, base, AVERY, 2, week_id, "mood", json!("great")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .patch(format!("{base}/api/athletes/2/weeks/{week_id}"))
        .header("x-user-id", AVERY.to_string())
        .header("content-type", "application/json")
        .body("{\"value\": 3")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let board: Value = client
        .get(format!("{base}/api/athletes/2"))
        .header("x-user-id", COACH.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(board["active_week"]["coach_notes"], json!("easy week"));
    assert!(board["active_week"]["label"].as_str().is_some_and(|label| label.contains(" - ")));
}

#[tokio::test]
async fn http_athletes_only_see_themselves() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let response = client
        .get(format!("{base}/api/athletes/1"))
        .header("x-user-id", QUINN.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(format!("{base}/api/athletes"))
        .header("x-user-id", QUINN.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client.get(format!("{base}/api/athletes")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let roster: Vec<Value> = client
        .get(format!("{base}/api/athletes"))
        .header("x-user-id", COACH.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<_> = roster.iter().map(|athlete| athlete["name"].clone()).collect();
    assert_eq!(names, vec![json!("Avery"), json!("Quinn"), json!("Riley")]);
}

#[tokio::test]
async fn http_deleted_active_week_is_reopened_on_next_load() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let first = dashboard(&client, base, QUINN, 3).await.active_week;

    let response = client
        .delete(format!("{base}/api/athletes/3/weeks/{}", first.id))
        .header("x-user-id", QUINN.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let reopened = dashboard(&client, base, QUINN, 3).await.active_week;
    assert_ne!(reopened.id, first.id);
    assert_eq!(reopened.status, "active");

    let response = client
        .get(format!("{base}/api/athletes/3/export.csv"))
        .header("x-user-id", QUINN.to_string())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let csv = response.text().await.unwrap();
    assert!(csv.starts_with("Week,Dates,Start,End,Status,VO2 MAX"));
    assert_eq!(csv.lines().count(), 2);
}
