use sqlx::SqlitePool;
use video_repost::cli::Prompter;
use video_repost::pipeline::{AdvanceReport, RecordStore};
use video_repost::stages::Collaborators;
use video_repost::{db, logging, utils, AppConfig, AppError, ResumeEngine, SqliteRecordStore};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    if let Err(e) = logging::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = AppConfig::from_env()?;
    tracing::info!("Configuration - {}", config.describe_credentials());

    for tool in ["ffmpeg", "ffprobe"] {
        if let Err(e) = utils::check_tool_available(tool).await {
            tracing::warn!("{} Watermarking will fail until this is fixed.", e);
        }
    }

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("📂 Pipeline database ready ({})", config.database_url);

    let result = run(&config, pool.clone()).await;

    pool.close().await;
    println!("Goodbye!");
    result
}

async fn run(config: &AppConfig, pool: SqlitePool) -> Result<(), AppError> {
    let engine = ResumeEngine::new(SqliteRecordStore::new(pool), Collaborators::from_config(config));
    let mut prompter = Prompter::stdio();

    if prompter.confirm("Would you like to upload failed videos (respond with 'yes' or 'y' if affirmative)? ")? {
        match engine.resume_all().await {
            Ok(summary) => prompter.say(&format!(
                "🔁 Resume pass: {} record(s) examined, {} completed, {} still pending, {} store error(s)",
                summary.examined, summary.completed, summary.parked, summary.store_failures
            ))?,
            Err(e) => {
                tracing::error!("Resume pass aborted: {}", e);
                prompter.say(&format!("❌ Could not read pending videos: {}", e))?;
            }
        }
    }

    if prompter.confirm("Would you like to upload a new video (respond with 'yes' or 'y' if affirmative)? ")? {
        let video = prompter.new_video()?;
        match engine.run_new(&video).await {
            Ok(report) => {
                let message = describe_report(&report, engine.store()).await;
                prompter.say(&message)?;
            }
            Err(e) => {
                tracing::error!("New video pass aborted: {}", e);
                prompter.say(&format!("❌ An error occurred while saving progress: {}", e))?;
            }
        }
    }

    Ok(())
}

async fn describe_report<S: RecordStore>(report: &AdvanceReport, store: &S) -> String {
    match &report.stopped {
        None => match store.get(&report.record_id).await {
            Ok(record) => format!(
                "✅ Video published. TikTok: {}, YouTube: https://youtube.com/shorts/{}",
                record.primary_publish_status.unwrap_or_default(),
                record.secondary_publish_status.unwrap_or_default()
            ),
            Err(_) => "✅ Video published.".to_string(),
        },
        Some(e) => format!(
            "❌ An error occurred: {}. Progress saved ({}); answer 'yes' to the first question next time to retry.",
            e, report.end_state
        ),
    }
}
