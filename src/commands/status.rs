use super::Overrides;
use anyhow::Result;
use technicpm::StateStore;

pub fn run(overrides: &Overrides) -> Result<()> {
    let config = overrides.load_config()?;
    let root = config.install_root()?;
    let store = StateStore::in_root(&root);

    let snapshot = match store.load()? {
        Some(snapshot) => snapshot,
        None => {
            println!("No installation found in {}", root.display());
            println!();
            println!("Run 'technicpm run' to install the configured modpack.");
            return Ok(());
        }
    };

    let descriptor = &snapshot.descriptor;
    println!("{} ({}) by {}", descriptor.display_name, descriptor.name, descriptor.user);
    println!("  Minecraft:  {}", descriptor.minecraft);
    println!("  Status:     {}", snapshot.status());
    println!(
        "  Build:      {}",
        snapshot.state.installed_build().unwrap_or("-")
    );
    println!(
        "  Kind:       {}",
        if descriptor.is_monolithic() {
            "monolithic".to_string()
        } else {
            format!(
                "solder ({})",
                descriptor
                    .endpoint
                    .as_ref()
                    .map(|e| e.as_str())
                    .unwrap_or_default()
            )
        }
    );
    println!(
        "  Files:      {} across {} component(s)",
        snapshot.files.file_count(),
        snapshot.files.len()
    );

    if !snapshot.components.is_empty() {
        println!();
        for component in &snapshot.components {
            println!("  {}", component.label());
        }
    }

    Ok(())
}
