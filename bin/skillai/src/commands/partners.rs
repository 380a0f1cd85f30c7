use crate::app::{Ai, App};
use skillai_core::{Capability, Partner, PartnerDraft};
use skillai_directory::ListOrigin;

fn xp_bar(xp: u32, threshold: u32) -> String {
    let width = 10usize;
    let filled = if threshold == 0 {
        width
    } else {
        (xp.min(threshold) as usize * width) / threshold as usize
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn print_row(app: &App, partner: &Partner) {
    let xp = app.tracker.xp(&partner.slug);
    let progress = if partner.evolution_disabled {
        "evolution disabled".to_string()
    } else if app.tracker.can_evolve(partner) {
        format!("{} ready to evolve", xp_bar(xp, app.tracker.xp_to_evolve()))
    } else {
        let threshold = app.tracker.xp_to_evolve();
        format!("{} {}/{} XP", xp_bar(xp, threshold), xp, threshold)
    };
    println!(
        "  {:<24} v{:<5.1} {:<6} {:<10} {}",
        partner.slug,
        partner.version,
        partner.primary_capability(),
        format!("{:?}", partner.tier),
        progress
    );
}

/// The "just evolved" banner is a gateway-session handoff; `evolve` prints
/// its own notice since each CLI command is a fresh session.
pub async fn list() -> anyhow::Result<()> {
    let app = App::start().await?;
    let directory = app.directory.read().await;

    if directory.list().is_empty() {
        println!("No partners yet. Create one with `skillai partners create`.");
        return Ok(());
    }

    let origin = match directory.origin() {
        ListOrigin::Remote => "Notion",
        ListOrigin::Cache => "local cache",
        ListOrigin::Empty => "empty",
    };
    println!("Partners ({}, from {}):", directory.list().len(), origin);
    if let Some(at) = directory.synced_at() {
        println!(
            "Synced {}",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        );
    }
    for partner in directory.list() {
        print_row(&app, partner);
    }
    Ok(())
}

pub async fn show(slug: &str) -> anyhow::Result<()> {
    let app = App::start().await?;
    let directory = app.directory.read().await;
    let partner = directory
        .get(slug)
        .ok_or_else(|| anyhow::anyhow!("Partner '{}' not found", slug))?;

    let xp = app.tracker.xp(slug);
    println!("{} ({})", partner.name, partner.slug);
    println!("  Skill:        {}", partner.skill);
    if let Some(description) = &partner.description {
        println!("  Description:  {}", description);
    }
    println!("  Version:      {:.1}", partner.version);
    println!("  Icon:         {}", partner.icon);
    println!("  Tier:         {:?} (${:.0}/month)", partner.tier, partner.price);
    let capabilities: Vec<&str> = partner.capabilities.iter().map(|c| c.as_str()).collect();
    println!("  Capabilities: {}", capabilities.join(", "));
    if partner.evolution_disabled {
        println!("  XP:           evolution disabled");
    } else {
        println!(
            "  XP:           {}/{} {}",
            xp,
            app.tracker.xp_to_evolve(),
            xp_bar(xp, app.tracker.xp_to_evolve())
        );
        if app.tracker.can_evolve(partner) {
            println!();
            println!("Ready to evolve! Run `skillai evolve {}`.", partner.slug);
        }
    }
    Ok(())
}

pub async fn create(
    name: String,
    skill: String,
    capability: &str,
    no_evolution: bool,
) -> anyhow::Result<()> {
    let capability = Capability::parse(capability).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown capability '{}': use text, image, audio or video",
            capability
        )
    })?;
    let draft = PartnerDraft {
        name,
        skill,
        capability,
        evolution_disabled: no_evolution,
    };
    draft.validate()?;

    let app = App::start().await?;
    let ai = Ai::from_config(&app)?;
    let partner = ai
        .author
        .create_partner(draft)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;

    let logged = app.directory.write().await.add(partner.clone())?;
    let _ = logged.await;

    println!("✓ Created {} ({})", partner.name, partner.slug);
    if let Some(description) = &partner.description {
        println!("  {}", description);
    }
    println!("  ${:.0}/month, {:?} tier, icon {}", partner.price, partner.tier, partner.icon);
    Ok(())
}

pub async fn delete(slug: &str) -> anyhow::Result<()> {
    let app = App::start().await?;
    let removed = app.directory.write().await.delete(slug)?;
    app.tracker.reset(slug);
    println!("✓ Deleted {}", removed.name);
    Ok(())
}

pub async fn sync() -> anyhow::Result<()> {
    let app = App::open()?;
    let count = app.directory.write().await.sync().await?;
    println!("✓ Synced {} partners from Notion", count);
    Ok(())
}
