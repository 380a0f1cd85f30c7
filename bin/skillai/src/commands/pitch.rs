use crate::app::{Ai, App};
use skillai_agent::{PitchIdeas, PitchRequest};

fn render(ideas: &PitchIdeas) -> String {
    let mut out = String::new();
    if !ideas.competition_suggestions.is_empty() {
        out.push_str("Competitions to enter:\n");
        for (i, c) in ideas.competition_suggestions.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n     {}\n", i + 1, c.category, c.justification));
        }
    }
    if !ideas.pitch_points.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Pitch points:\n");
        for p in &ideas.pitch_points {
            out.push_str(&format!("  • {}\n    {}\n", p.point, p.elaboration));
        }
    }
    out
}

pub async fn run(name: String, description: String, audience: String) -> anyhow::Result<()> {
    let app = App::open()?;
    let ai = Ai::from_config(&app)?;
    let request = PitchRequest {
        app_name: name,
        app_description: description,
        target_audience: audience,
    };

    println!("Asking the startup advisor about {}...", request.app_name.trim());
    let ideas = ai
        .author
        .pitch_ideas(&request)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    print!("{}", render(&ideas));
    Ok(())
}
