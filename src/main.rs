use log::{info, warn};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // A broken preferences file degrades to defaults rather than refusing
    // to start.
    let prefs = match music_shell::Preferences::load() {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!("using default preferences: {err:#}");
            music_shell::Preferences::default()
        }
    };

    info!("starting music shell");
    music_shell::run(prefs)
}
