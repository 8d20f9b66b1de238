use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use csvflow::{
    logging, run, AppConfig, Args, BrowseError, CacheManager, ConfigManager, Session,
    SessionOptions, APP_NAME,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        let path = manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = AppConfig::load(APP_NAME)?;
    apply_overrides(&args, &mut config);
    config.validate()?;

    let debug = args.debug_enabled() || config.debug.enabled;
    let cache = CacheManager::new(APP_NAME)?;
    if let Err(e) = logging::init(&cache, debug) {
        eprintln!("Warning: {}", e);
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "csvflow starting");

    if let Some(kind) = args.export {
        let dir = config.export.dir_path();
        let options = SessionOptions::from(&args);
        let mut session = Session::open(config, args.source_identifier(), &options);
        let cycle = session.cycle();
        if let Err(e) = cycle.view {
            return Err(report(e));
        }
        let path = session
            .export(kind, &dir, chrono::Local::now().naive_local())
            .map_err(report)?;
        println!("{}", path.display());
        return Ok(());
    }

    run(&args, config)
}

/// CLI values take precedence over environment and config file.
fn apply_overrides(args: &Args, config: &mut AppConfig) {
    if let Some(dir) = &args.data_dir {
        config.source.data_dir = Some(dir.display().to_string());
    }
    if let Some(base) = &args.remote_base {
        config.source.remote_base = Some(base.clone());
    }
    if let Some(dir) = &args.out_dir {
        config.export.dir = Some(dir.display().to_string());
    }
}

fn report(e: BrowseError) -> color_eyre::Report {
    eyre!("{}", e)
}
