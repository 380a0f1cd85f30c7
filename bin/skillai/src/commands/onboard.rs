use skillai_core::{Config, Paths};
use std::io::{self, Write};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();

    if paths.config_file().exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    paths.ensure_dirs()?;
    Config::default().save(&paths.config_file())?;
    println!("✓ Created config: {}", paths.config_file().display());
    println!("✓ Local storage:  {}", paths.local_storage_file().display());

    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} to add your Gemini API key (or set GEMINI_API_KEY)",
        paths.config_file().display()
    );
    println!("  2. Optionally fill in the notion section to load published partners");
    println!("  3. Run `skillai status` to verify configuration");
    println!("  4. Run `skillai partners create --name ... --skill ...` to build your first partner");

    Ok(())
}
