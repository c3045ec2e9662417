use super::Overrides;
use anyhow::Result;
use technicpm::StateStore;

pub fn run(overrides: &Overrides) -> Result<()> {
    let config = overrides.load_config()?;
    let store = StateStore::in_root(config.install_root()?);

    if !store.exists() {
        println!("Nothing to reset: no state file at {}", store.path().display());
        return Ok(());
    }

    store.discard()?;
    println!("✓ Removed {}", store.path().display());
    println!("The next run will install the modpack from scratch.");
    Ok(())
}
