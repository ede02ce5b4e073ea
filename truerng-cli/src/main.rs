use std::{path::PathBuf, time::Duration};

use clap::Parser;
use truerng::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dice formula, e.g. `2d6+3`
    #[arg(default_value = "1d20")]
    formula: String,

    /// Number of times to roll the formula
    #[arg(short = 'n', long, default_value_t = 1)]
    times: usize,

    /// Settings JSON file path
    #[arg(short, long, default_value = "truerng-settings.json", value_name = "FILE")]
    settings: PathBuf,

    /// Local key/value file that mirrors the API key
    #[arg(long, default_value = ".truerng/local.json", value_name = "FILE")]
    local_store: PathBuf,

    /// random.org API key (overrides the settings file)
    #[arg(long, env = "RANDOM_ORG_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Roll with the built-in generator only
    #[arg(long, default_value_t = false)]
    disable: bool,

    /// Flip the quick toggle before rolling
    #[arg(long, default_value_t = false)]
    toggle: bool,

    /// Log every batch fetched from random.org
    #[arg(long, default_value_t = false)]
    show_seeds: bool,

    /// Seed for the fallback generator, for reproducibility
    #[arg(long, default_value = None)]
    seed: Option<u64>,

    /// Seconds to wait for the first batch before rolling
    #[arg(short, long, default_value_t = 10)]
    wait: u64,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write the settings in effect back to the settings file
    #[arg(long, default_value_t = false)]
    save_settings: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.settings)?;
    if let Some(key) = &args.api_key {
        settings.api_key = ApiKey::new(key.as_str());
    }
    if args.disable {
        settings.enabled = false;
    }
    if args.show_seeds {
        settings.show_seeds = true;
    }

    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(if settings.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    log::info!("Rolling {} x{}", args.formula, args.times);

    let formula: DiceFormula = args.formula.parse()?;

    let roller = match args.seed {
        Some(seed) => Roller::from_seed(seed),
        None => Roller::new(),
    };
    let cache = SupplyCache::new(roller.into_fallback());
    let mut rng = TrueRng::new(cache, random_org_factory()).with_settings_path(&args.settings);
    let mut store = FileCredentialStore::new(&args.local_store);
    rng.start(settings, &mut store)?;

    if args.toggle {
        let enabled = rng.click_toggle();
        log::info!("Quick toggle flipped to {}", rng.quick_toggle().label());
        log::debug!("Enabled: {enabled}");
    }

    if rng.cache().is_enabled() && rng.cache().is_awaiting_response() {
        let start = chrono::Utc::now();
        if rng.prewarm(Duration::from_secs(args.wait)) {
            log::info!(
                "Buffered {} true random numbers in {} ms",
                rng.cache().len(),
                (chrono::Utc::now() - start).num_milliseconds()
            );
        } else {
            log::warn!(
                "No response from random.org within {}s; rolling with the built-in generator",
                args.wait
            );
        }
    }

    let mut results = Vec::with_capacity(args.times);
    for _ in 0..args.times {
        results.push(formula.roll(|| rng.random_uniform()));
    }

    if args.json {
        let stdout = std::io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &results)?;
        println!();
    } else {
        for result in &results {
            println!("{result}");
        }
    }

    log::info!(
        "TrueRNG [{}]: {} values left in buffer, last value {:?}",
        rng.quick_toggle().label(),
        rng.cache().len(),
        rng.last_value()
    );

    if args.save_settings {
        rng.settings().save(&args.settings)?;
        log::info!("Settings written to {}", args.settings.display());
    }

    Ok(())
}
