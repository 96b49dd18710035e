use brokkr::{
    cli::{Cli, Commands},
    settings::BrokkrSettings,
};
use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_panic_hook();
    let args = Cli::parse();
    init_tracing(args.verbose);

    let settings = BrokkrSettings::load_for(args.robot.as_deref())?;

    match args.action {
        Commands::Validate(opts) => opts.validate(&settings)?,
        Commands::Compare(opts) => opts.compare()?,
        Commands::Template(opts) => opts.template()?,
        Commands::Analyze(opts) => opts.analyze()?,
        Commands::Retarget(opts) => opts.retarget(&settings)?,
        Commands::Batch(opts) => opts.batch(settings).await?,
    }

    Ok(())
}

/// `RUST_LOG` takes precedence over the `-v` flags.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
