use crate::app::{Ai, App};
use skillai_core::Partner;
use skillai_storage::{SessionFlags, EVOLVED_SLUG_KEY};

/// The CLI session ends with this command, so the evolved-partner handoff is
/// consumed here instead of by a later `partners list`.
fn evolved_notice(flags: &SessionFlags, partner: &Partner) -> Option<String> {
    let slug = flags.take(EVOLVED_SLUG_KEY)?;
    (slug == partner.slug).then(|| {
        format!(
            "🎉 {} just evolved to v{:.1}! Its new skill is live.",
            partner.name, partner.version
        )
    })
}

pub async fn run(slug: &str) -> anyhow::Result<()> {
    let app = App::start().await?;
    let mut partner = app
        .directory
        .read()
        .await
        .get(slug)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Partner '{}' not found", slug))?;
    let ai = Ai::from_config(&app)?;

    println!("Evolving {} v{:.1}...", partner.name, partner.version);
    let outcome = ai
        .engine
        .evolve(&mut partner)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    app.directory.write().await.update(partner.clone())?;

    println!(
        "✓ {} evolved: v{:.1} → v{:.1}",
        partner.name, outcome.previous_version, outcome.new_version
    );
    println!("  New skill: {}", outcome.new_skill);
    if let Some(notice) = evolved_notice(&app.flags, &partner) {
        println!("{}", notice);
    }
    Ok(())
}
