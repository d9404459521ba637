//! Test Transaction Producer
//!
//! Publishes synthetic transactions to NATS for exercising the detector.
//!
//! Usage: test_producer [NATS_URL] [SUBJECT] [COUNT] [FRAUD_RATE] [DELAY_MS] [INVALID_RATE]

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{info, warn};

/// Transaction structure as the ingestion service publishes it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Transaction {
    id: String,
    user_id: String,
    merchant_id: String,
    amount: f64,
    /// Milliseconds since the Unix epoch
    timestamp: i64,
}

/// What one generated message looks like
enum Payload {
    Legitimate(Transaction),
    Suspicious(Transaction),
    Malformed(Vec<u8>),
    MissingAmount(serde_json::Value),
}

impl Payload {
    fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(match self {
            Payload::Legitimate(tx) | Payload::Suspicious(tx) => serde_json::to_vec(tx)?,
            Payload::Malformed(bytes) => bytes.clone(),
            Payload::MissingAmount(value) => serde_json::to_vec(value)?,
        })
    }
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
    legitimate: Normal<f64>,
    suspicious: Normal<f64>,
}

impl TransactionGenerator {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
            legitimate: Normal::new(50.0, 10.0)?,
            suspicious: Normal::new(500.0, 50.0)?,
        })
    }

    fn next_id(&mut self) -> String {
        self.transaction_counter += 1;
        format!("tx_{:012}", self.transaction_counter)
    }

    fn base(&mut self, amount: f64) -> Transaction {
        Transaction {
            id: self.next_id(),
            user_id: format!("user_{}", self.rng.gen_range(1..500)),
            merchant_id: format!("merchant_{}", self.rng.gen_range(1..1000)),
            amount: (amount * 100.0).round() / 100.0,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Everyday purchase around 50
    fn generate_legitimate(&mut self) -> Transaction {
        let amount = self.legitimate.sample(&mut self.rng).max(0.01);
        self.base(amount)
    }

    /// Outsized purchase around 500
    fn generate_suspicious(&mut self) -> Transaction {
        let amount = self.suspicious.sample(&mut self.rng);
        self.base(amount)
    }

    /// Either bytes that are not JSON or a record without an amount
    fn generate_invalid(&mut self) -> Payload {
        if self.rng.gen_bool(0.5) {
            Payload::Malformed(b"\x00not-json{".to_vec())
        } else {
            let tx = self.generate_legitimate();
            Payload::MissingAmount(serde_json::json!({
                "id": tx.id,
                "userId": tx.user_id,
                "merchantId": tx.merchant_id,
                "timestamp": tx.timestamp,
            }))
        }
    }

    fn generate(&mut self, fraud_rate: f64, invalid_rate: f64) -> Payload {
        if self.rng.gen_bool(invalid_rate) {
            self.generate_invalid()
        } else if self.rng.gen_bool(fraud_rate) {
            Payload::Suspicious(self.generate_suspicious())
        } else {
            Payload::Legitimate(self.generate_legitimate())
        }
    }
}

#[derive(Default)]
struct Tally {
    legitimate: u64,
    suspicious: u64,
    invalid: u64,
}

impl Tally {
    fn add(&mut self, payload: &Payload) {
        match payload {
            Payload::Legitimate(_) => self.legitimate += 1,
            Payload::Suspicious(_) => self.suspicious += 1,
            Payload::Malformed(_) | Payload::MissingAmount(_) => self.invalid += 1,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let invalid_rate: f64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(0.0);

    let fraud_rate = fraud_rate.clamp(0.0, 1.0);
    let invalid_rate = invalid_rate.clamp(0.0, 1.0);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count,
        fraud_rate,
        delay_ms,
        invalid_rate,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            Some(c)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            None
        }
    };

    let mut generator = TransactionGenerator::new()?;
    let mut tally = Tally::default();

    for i in 0..count {
        let payload = generator.generate(fraud_rate, invalid_rate);
        tally.add(&payload);
        let bytes = payload.to_bytes()?;

        match &client {
            Some(client) => client.publish(subject.to_string(), bytes.into()).await?,
            None if i == 0 || (i + 1) % 10 == 0 => {
                info!("Sample message {}: {}", i + 1, String::from_utf8_lossy(&bytes));
            }
            None => {}
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} messages ({} legitimate, {} suspicious, {} invalid)",
                i + 1,
                count,
                tally.legitimate,
                tally.suspicious,
                tally.invalid
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    if let Some(client) = &client {
        client.flush().await?;
    }

    info!(
        "Completed! Published {} messages ({} legitimate, {} suspicious, {} invalid)",
        count, tally.legitimate, tally.suspicious, tally.invalid
    );

    Ok(())
}
