use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usagemon::config::{Config, Settings};
use usagemon::report;
use usagemon_core::{collect_all, Collector};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();
    debug!("Settings: {:?}", settings);

    let collectors: Vec<Collector> = settings
        .selected_services(&cli.services)
        .into_iter()
        .map(|service| {
            let collector = Collector::for_service(service).with_timeout(settings.timeout());
            match &settings.services.get(service).command {
                Some(command) => collector.with_program(command.clone()),
                None => collector,
            }
        })
        .collect();

    let results = collect_all(&collectors).await;

    if cli.json {
        println!("{}", report::render_json(&results)?);
    } else {
        print!("{}", report::render_text(&results, &settings.services));
    }

    if !results.iter().any(|(_, outcome)| outcome.is_success()) {
        std::process::exit(1);
    }
    Ok(())
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("usagemon=debug,usagemon_core=debug")
    } else {
        EnvFilter::new("usagemon=info,usagemon_core=warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
