//! Document review example with an in-process worker.
//!
//! This example demonstrates how to plug a domain worker into a
//! `JobManager`, submit documents, and read outcomes back by polling,
//! including a rejected payload and a review that exceeds its timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobwarden::telemetry::init_tracing;
use jobwarden::*;
use jobwarden_testkit::{document, Document, DocumentValidator, ScoreResult};

/// Worker that "reviews" a document by scoring its name.
struct ReviewWorker;

#[async_trait]
impl Worker<Document, ScoreResult> for ReviewWorker {
    async fn execute(&self, payload: Document, ctx: WorkContext) -> anyhow::Result<ScoreResult> {
        let name = payload.unwrap_or_default();
        println!("[WORKER] Reviewing {} (attempt {})", name, ctx.attempt());

        let work = if name.starts_with("huge") {
            Duration::from_secs(2)
        } else {
            Duration::from_millis(50)
        };

        tokio::select! {
            _ = tokio::time::sleep(work) => {}
            _ = ctx.cancel_token().cancelled() => {
                println!("[WORKER] Review of {} cancelled", name);
                anyhow::bail!("review cancelled");
            }
        }

        let score = u32::try_from(name.len() % 10).unwrap_or(0);
        Ok(ScoreResult::new(score))
    }

    fn observes_cancellation(&self) -> bool {
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogLevel::Info);

    println!("=== Jobwarden Document Review Example ===\n");

    let config = ManagerConfig::default()
        .with_default_job(JobConfig::default().with_timeout(Duration::from_millis(500)))
        .with_poll(PollConfig::new(Duration::from_millis(20), 100));

    let manager = JobManagerBuilder::new(config)
        .with_worker(Arc::new(ReviewWorker))
        .with_validator(Arc::new(DocumentValidator))
        .build()?;

    println!("1. Submitting documents...");
    let mut ids = Vec::new();
    for payload in [
        document("resume.pdf"),
        document("cover-letter.docx"),
        None,
        document("huge-portfolio.zip"),
    ] {
        match manager.submit(payload.clone(), None) {
            Ok(id) => {
                println!("   submitted {:?} as {}", payload, id);
                ids.push(id);
            }
            Err(e) => println!("   submission of {:?} rejected: {}", payload, e),
        }
    }

    println!("\n2. Waiting for outcomes...");
    for id in &ids {
        let job = manager.wait(*id).await?;
        println!("   {}", serde_json::to_string(&job)?);
    }

    println!("\n3. Health:");
    println!("   {}", serde_json::to_string_pretty(&manager.health())?);

    manager.close().await?;
    println!("\n=== Example complete ===");
    Ok(())
}
