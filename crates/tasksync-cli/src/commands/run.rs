use super::{load_config, reconciler, CliResult};

pub async fn run(dry_run: bool) -> CliResult {
    let config = load_config()?;
    let summary = reconciler(&config, dry_run)?.run().await?;
    println!("{summary}");
    Ok(())
}
