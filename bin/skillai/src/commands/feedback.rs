use crate::app::App;

pub async fn run(text: &str) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Feedback cannot be empty");
    }
    let app = App::open()?;
    if !app.config.notion.is_enabled() || app.config.notion.feedback_database().is_none() {
        println!("⚠ Notion feedback database not configured, feedback was not sent.");
        return Ok(());
    }
    app.directory.read().await.log_feedback(text).await;
    println!("✓ Thanks for your feedback!");
    Ok(())
}
