//! Sample Scoring Request Producer
//!
//! Generates random patient snapshots and publishes scoring requests to NATS
//! for exercising the scoring service.

use ckd_predictor::types::{PatientSnapshot, ScoringRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random patient generator around the reference patient
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
    patient_counter: i64,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            patient_counter: 0,
        }
    }

    /// Patient with normal kidney function
    fn generate_healthy(&mut self) -> PatientSnapshot {
        let rng = &mut self.rng;
        PatientSnapshot {
            age: rng.gen_range(20..70),
            gender: rng.gen_range(0..2),
            ethnicity: rng.gen_range(0..4),
            socioeconomic_status: rng.gen_range(0..3),
            education_level: rng.gen_range(0..4),
            bmi: rng.gen_range(18.5..30.0),
            smoking: i32::from(rng.gen_bool(0.2)),
            physical_activity: rng.gen_range(2.0..10.0),
            family_history_kidney_disease: i32::from(rng.gen_bool(0.1)),
            systolic_bp: rng.gen_range(100.0..135.0),
            diastolic_bp: rng.gen_range(60.0..85.0),
            fasting_blood_sugar: rng.gen_range(70.0..110.0),
            hba1c: rng.gen_range(4.5..6.0),
            serum_creatinine: rng.gen_range(0.6..1.2),
            bun_levels: rng.gen_range(7.0..20.0),
            gfr: rng.gen_range(75.0..120.0),
            protein_in_urine: rng.gen_range(0.0..0.5),
            acr: rng.gen_range(0.0..30.0),
            hemoglobin_levels: rng.gen_range(12.5..17.0),
            edema: 0,
            fatigue_levels: rng.gen_range(0.0..4.0),
            quality_of_life_score: rng.gen_range(60.0..100.0),
            ..PatientSnapshot::reference()
        }
    }

    /// Patient with markers of reduced kidney function
    fn generate_at_risk(&mut self) -> PatientSnapshot {
        let rng = &mut self.rng;
        PatientSnapshot {
            age: rng.gen_range(50..90),
            gender: rng.gen_range(0..2),
            bmi: rng.gen_range(27.0..40.0),
            smoking: i32::from(rng.gen_bool(0.5)),
            family_history_kidney_disease: i32::from(rng.gen_bool(0.5)),
            family_history_hypertension: i32::from(rng.gen_bool(0.7)),
            family_history_diabetes: i32::from(rng.gen_bool(0.6)),
            previous_acute_kidney_injury: i32::from(rng.gen_bool(0.4)),
            systolic_bp: rng.gen_range(140.0..180.0),
            diastolic_bp: rng.gen_range(85.0..110.0),
            fasting_blood_sugar: rng.gen_range(110.0..200.0),
            hba1c: rng.gen_range(6.5..10.0),
            serum_creatinine: rng.gen_range(1.5..5.0),
            bun_levels: rng.gen_range(25.0..60.0),
            gfr: rng.gen_range(15.0..60.0),
            protein_in_urine: rng.gen_range(1.0..5.0),
            acr: rng.gen_range(30.0..300.0),
            hemoglobin_levels: rng.gen_range(9.0..12.5),
            ace_inhibitors: i32::from(rng.gen_bool(0.5)),
            diuretics: i32::from(rng.gen_bool(0.4)),
            antidiabetic_medications: i32::from(rng.gen_bool(0.5)),
            edema: i32::from(rng.gen_bool(0.6)),
            fatigue_levels: rng.gen_range(4.0..10.0),
            muscle_cramps: rng.gen_range(2.0..7.0),
            itching: rng.gen_range(2.0..10.0),
            quality_of_life_score: rng.gen_range(10.0..60.0),
            ..PatientSnapshot::reference()
        }
    }

    fn next_request(&mut self, at_risk_rate: f64) -> anyhow::Result<(ScoringRequest, bool)> {
        self.patient_counter += 1;
        let at_risk = self.rng.gen_bool(at_risk_rate);
        let snapshot = if at_risk {
            self.generate_at_risk()
        } else {
            self.generate_healthy()
        };

        let request = ScoringRequest {
            patient_id: self.patient_counter,
            features: snapshot.to_record()?,
        };
        Ok((request, at_risk))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_producer=info".parse()?),
        )
        .init();

    info!("Starting Sample Scoring Request Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or("ckd.scoring.requests");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let at_risk_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        at_risk_rate = at_risk_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, at_risk_rate, delay_ms).await;
        }
    };

    let mut generator = PatientGenerator::new();
    let mut healthy_count = 0;
    let mut at_risk_count = 0;

    info!("Starting to publish {} scoring requests...", count);

    for i in 0..count {
        let (request, at_risk) = generator.next_request(at_risk_rate)?;
        if at_risk {
            at_risk_count += 1;
        } else {
            healthy_count += 1;
        }

        let payload = serde_json::to_vec(&request)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} requests ({} healthy, {} at risk)",
                i + 1,
                count,
                healthy_count,
                at_risk_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;

    info!(
        "Completed! Published {} requests ({} healthy, {} at risk)",
        count, healthy_count, at_risk_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, at_risk_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = PatientGenerator::new();

    for i in 0..count {
        let (request, _) = generator.next_request(at_risk_rate)?;

        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&request)?;
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
