mod scenario;

use anyhow::{Context, Result};
use scenario::Scenario;
use std::{env, path::PathBuf, process};
use surface_reconcile_config::Config;
use surface_reconcile_engine::ReconcilerSettings;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let (scenario_path, config_path) = match args.as_slice() {
        [_, scenario] => (PathBuf::from(scenario), Config::config_path()),
        [_, scenario, config] => {
            let config = PathBuf::from(config);
            (PathBuf::from(scenario), Config::expand_path(&config).unwrap_or(config))
        }
        _ => {
            let program = args.first().map_or("surface-reconcile", String::as_str);
            eprintln!("Usage: {program} <scenario.toml> [config.toml]");
            process::exit(1);
        }
    };

    let config = Config::load_or_default(&config_path)?;
    log::info!("Config path: {}", config_path.display());
    let settings = ReconcilerSettings::try_from(&config)
        .with_context(|| format!("Invalid quirk in config file '{}'", config_path.display()))?;

    let scenario = Scenario::load(&scenario_path)?;
    log::info!("Replaying scenario {}", scenario_path.display());
    let outcome = scenario.run(settings)?;
    print!("{outcome}");
    Ok(())
}
