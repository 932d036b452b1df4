// List pipeline records that still have unfinished stages
use video_repost::pipeline::RecordStore;
use video_repost::{db, AppConfig, SqliteRecordStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let store = SqliteRecordStore::new(pool.clone());

    println!("\n=== Pending Pipeline Records ===\n");

    let records = store.list_incomplete().await;
    match &records {
        Ok(records) if records.is_empty() => println!("Nothing pending - every video made it through."),
        Ok(records) => {
            for record in records {
                let next = record
                    .state()
                    .next_stage()
                    .map(|stage| stage.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "ID: {} | Created: {} | State: {:<14} | Next: {:<14} | URL: {}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    record.state().to_string(),
                    next,
                    record.source_url
                );
            }
            println!("\n{} record(s) pending", records.len());
        }
        Err(e) => eprintln!("❌ Failed to list records: {}", e),
    }

    pool.close().await;
    records.map(|_| ()).map_err(Into::into)
}
