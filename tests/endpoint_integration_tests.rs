/// Endpoint walkthrough against a running server.
///
/// Replays the clinic scenario over HTTP: register a one-hour doctor, fill
/// the slot with walk-ins, queue one more, bump with a priority token, then
/// cancel and watch the queue drain. Point `API_BASE_URL` at the server
/// (defaults to a local instance).

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "http://localhost:3000/allocation";
const SLOT_CAPACITY: usize = 10;

pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response, Box<dyn std::error::Error>> {
        Ok(self.client.get(format!("{}{}", self.base_url, path)).send().await?)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Response, Box<dyn std::error::Error>> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?)
    }
}

/// Test results tracker
#[derive(Debug, Default)]
pub struct TestResults {
    pub passed: u32,
    pub failed: u32,
    pub failures: Vec<String>,
}

impl TestResults {
    pub fn check(&mut self, test_name: &str, ok: bool, detail: impl Into<String>) {
        if ok {
            self.passed += 1;
            println!("✅ {}", test_name);
        } else {
            let detail = detail.into();
            self.failed += 1;
            println!("❌ {}: {}", test_name, detail);
            self.failures.push(format!("{}: {}", test_name, detail));
        }
    }

    pub fn summary(&self) {
        println!("\n📊 Test Summary:");
        println!("✅ Passed: {}", self.passed);
        println!("❌ Failed: {}", self.failed);

        if !self.failures.is_empty() {
            println!("\n🔍 Failures:");
            for failure in &self.failures {
                println!("  - {}", failure);
            }
        }
    }
}

async fn allocate(
    client: &ApiTestClient,
    doctor_id: &str,
    patient_id: &str,
    source: &str,
) -> Result<Value, Box<dyn std::error::Error>> {
    let response = client
        .post(
            "/tokens",
            json!({
                "patient_id": patient_id,
                "doctor_id": doctor_id,
                "slot_time": "09:00",
                "source": source
            }),
        )
        .await?;
    Ok(response.json().await?)
}

pub async fn run_endpoint_tests() -> Result<TestResults, Box<dyn std::error::Error>> {
    let client = ApiTestClient::new();
    let mut results = TestResults::default();
    let doctor_id = format!("SMOKE-{}", Uuid::new_v4().simple());

    println!("🚀 Starting endpoint walkthrough against {}", client.base_url);

    let response = client
        .post(
            "/doctors",
            json!({
                "id": doctor_id,
                "name": "Dr. Smoke",
                "specialization": "General",
                "working_hours_start": 9,
                "working_hours_end": 10
            }),
        )
        .await?;
    results.check("Register doctor", response.status() == StatusCode::OK, format!("Status: {}", response.status()));

    let mut walkins = Vec::new();
    for i in 0..SLOT_CAPACITY {
        let body = allocate(&client, &doctor_id, &format!("W{}", i), "walkin").await?;
        walkins.push(body["token"]["id"].as_str().unwrap_or_default().to_string());
    }
    let body = allocate(&client, &doctor_id, "W-late", "walkin").await?;
    results.check(
        "Eleventh walk-in is queued",
        body["placement"]["kind"] == "queued",
        body.to_string(),
    );

    let body = allocate(&client, &doctor_id, "VIP", "priority").await?;
    results.check(
        "Priority token bumps first walk-in",
        body["evicted_token_id"].as_str() == walkins.first().map(String::as_str),
        body.to_string(),
    );

    let response = client.post(&format!("/tokens/{}/cancel", walkins[5]), json!({})).await?;
    let body: Value = response.json().await?;
    results.check(
        "Cancellation replays the queue",
        body["replayed"].as_array().map(Vec::len) == Some(1),
        body.to_string(),
    );

    let response = client.get(&format!("/doctors/{}/schedule", doctor_id)).await?;
    let body: Value = response.json().await?;
    results.check(
        "Slot is full again",
        body["schedule"]["slots"][0]["occupied"] == SLOT_CAPACITY,
        body.to_string(),
    );

    let response = client.get(&format!("/tokens/{}", Uuid::new_v4())).await?;
    results.check(
        "Unknown token is 404",
        response.status() == StatusCode::NOT_FOUND,
        format!("Status: {}", response.status()),
    );

    let response = client.get("/stats").await?;
    let body: Value = response.json().await?;
    results.check(
        "Stats report a queue",
        body["stats"]["queue_length"].as_u64().unwrap_or(0) >= 1,
        body.to_string(),
    );

    Ok(results)
}

/// Entry point for endpoint tests
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let results = run_endpoint_tests().await?;
    results.summary();

    if results.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
