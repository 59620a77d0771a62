use std::sync::Arc;

use anyhow::Context;
use job_tracker::config::{Config, MailSourceConfig};
use job_tracker::export::XlsxExporter;
use job_tracker::llm::{CompletionService, OpenAiClient};
use job_tracker::mail::{EmlDirSource, GmailSource, MailSource};
use job_tracker::pipeline::extractor::StructuredExtractor;
use job_tracker::pipeline::{Classifier, JobPipeline, PipelineSettings, RunOutcome, RunStats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Credentials are checked before any network I/O.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("Error: {e}");
            eprintln!("  export OPENAI_API_KEY=sk-...");
            eprintln!("  export GMAIL_ACCESS_TOKEN=ya29...   (or JOB_TRACKER_SOURCE=eml)");
            std::process::exit(1);
        }
    };

    eprintln!("📬 Job Tracker v{}", env!("CARGO_PKG_VERSION"));
    let llm = Arc::new(OpenAiClient::from_config(&config.completion));
    eprintln!("   Model: {}", llm.model_name());
    eprintln!("   Time zone: {}", config.timezone);
    eprintln!("   Output: {}", config.output_path.display());

    let source: Arc<dyn MailSource> = match &config.mail {
        MailSourceConfig::Gmail {
            access_token,
            user_id,
            base_url,
        } => Arc::new(GmailSource::new(
            access_token.clone(),
            user_id.clone(),
            base_url.clone(),
        )),
        MailSourceConfig::EmlDir { path } => Arc::new(EmlDirSource::new(path.clone())),
    };
    eprintln!("   Source: {}\n", source.name());

    let pipeline = JobPipeline::new(
        PipelineSettings::from_config(&config),
        source,
        Classifier::default(),
        StructuredExtractor::new(llm),
        Arc::new(XlsxExporter::new(config.output_path.clone())),
    );

    let outcome = pipeline.run().await.context("job tracker run failed")?;
    tracing::info!(outcome = outcome.label(), "Run finished");
    match outcome {
        RunOutcome::NoCandidates => {
            println!("No candidate messages found.");
        }
        RunOutcome::NoMatches { stats } => {
            println!("No job application confirmations found.");
            print_stats(&stats);
        }
        RunOutcome::Exported { stats, summary } => {
            println!(
                "Exported {} confirmation(s) to {}",
                summary.rows,
                summary.output_path.display()
            );
            print_stats(&stats);
        }
    }

    Ok(())
}

fn print_stats(stats: &RunStats) {
    println!(
        "  candidates: {}, accepted: {}, rejected: {}, duplicates: {}, before date: {}",
        stats.candidates, stats.accepted, stats.rejected, stats.duplicates, stats.before_boundary
    );
    if stats.malformed > 0 {
        println!("  skipped unparseable: {}", stats.malformed);
    }
    if stats.missing_timestamp > 0 {
        println!("  skipped without timestamp: {}", stats.missing_timestamp);
    }
    if stats.extraction_failures > 0 {
        println!("  extraction fell back to Unknown: {}", stats.extraction_failures);
    }
    if stats.body_decode_failures > 0 {
        println!("  undecodable body parts: {}", stats.body_decode_failures);
    }
}
