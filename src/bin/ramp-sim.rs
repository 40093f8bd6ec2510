use ramp_sim::actions;
use ramp_sim::config::{self, Command, ConfigArgs, RunArgs};
use ramp_sim::engine;
use ramp_sim::error::Result;
use ramp_sim::models::SimConfig;
use ramp_sim::output::{
    ConsoleSink, Formatter, HumanFormatter, JsonFileSink, JsonFormatter, OutputFormat, ReportSink,
};
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ramp_sim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = config::parse_args()?;
    match cli.command {
        Command::Run(args) => run_load_test(args),
        Command::ShowConfig(args) => {
            let config = resolve(&args)?;
            print!("{}", config::describe_config(&config));
            Ok(())
        }
    }
}

fn resolve(args: &ConfigArgs) -> Result<SimConfig> {
    let config = config::build_config(args)?;
    engine::validate_config(&config)?;
    actions::build_catalog(&config.actions, config.seed)?;
    Ok(config)
}

fn run_load_test(args: RunArgs) -> Result<()> {
    let config = resolve(&args.config)?;
    let catalog = actions::build_catalog(&config.actions, config.seed)?;
    let format: OutputFormat = args.format.into();

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleSink::stdout(format))];
    if let Some(path) = &args.output {
        sinks.push(Box::new(JsonFileSink::new(path)));
    }

    let summary = engine::run_simulation(&config, catalog, Box::new(sinks))?;

    let formatter = formatter_for(format);
    print!("{}", formatter.write(&summary));
    Ok(())
}

fn formatter_for(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
