use crate::app::{Ai, App};
use skillai_core::types::ChatMessage;
use skillai_core::Partner;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

fn ready_notice(app: &App, partner: &Partner, xp_before: u32, xp_after: u32) {
    let threshold = app.tracker.xp_to_evolve();
    if xp_before < threshold && xp_after >= threshold && !partner.evolution_disabled {
        println!();
        println!(
            "✨ {} is ready to evolve! Run `skillai evolve {}`.",
            partner.name, partner.slug
        );
    }
}

async fn turn(
    app: &App,
    ai: &Ai,
    partner: &Partner,
    history: &mut Vec<ChatMessage>,
    input: &str,
) -> bool {
    history.push(ChatMessage::user(input));
    let xp_before = app.tracker.xp(&partner.slug);
    match ai.chat.send(partner, history).await {
        Ok(reply) => {
            println!("{}", reply.response);
            history.push(ChatMessage::assistant(&reply.response));
            ready_notice(app, partner, xp_before, reply.xp);
            true
        }
        Err(e) => {
            history.pop();
            eprintln!("✗ {}", e.user_message());
            false
        }
    }
}

pub async fn run(slug: &str, message: Option<String>) -> anyhow::Result<()> {
    let app = App::start().await?;
    let partner = app
        .directory
        .read()
        .await
        .get(slug)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Partner '{}' not found", slug))?;
    let ai = Ai::from_config(&app)?;
    let mut history = Vec::new();

    if let Some(message) = message {
        if !turn(&app, &ai, &partner, &mut history, &message).await {
            anyhow::bail!("Chat failed");
        }
        return Ok(());
    }

    println!(
        "Chatting with {} v{:.1} ({}). /quit to exit.",
        partner.name, partner.version, partner.skill
    );
    let suggestion = ai.author.suggest_prompt(&partner.skill).await;
    println!("Try: {}", suggestion);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }
        if input == "/xp" {
            println!(
                "{} XP / {}",
                app.tracker.xp(&partner.slug),
                app.tracker.xp_to_evolve()
            );
            continue;
        }
        turn(&app, &ai, &partner, &mut history, input).await;
    }
    Ok(())
}
