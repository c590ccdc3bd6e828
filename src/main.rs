use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use testplan_bdd::cli::{
    Command, ConnectionArgs, FeaturesArgs, GraphArgs, RootArgs, RunnersArgs, ValidateArgs,
};
use testplan_bdd::source::RestPlanSource;
use testplan_bdd::{BridgeConfig, BridgeError, PlanBridge};

/// Environment variable holding the service access token.
const TOKEN_ENV: &str = "TPBDD_TOKEN";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Features(args) => cmd_features(args),
        Command::Runners(args) => cmd_runners(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Graph(args) => cmd_graph(args),
    }
}

fn connect(connection: &ConnectionArgs) -> Result<BridgeConfig> {
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{TOKEN_ENV} is not set; export an access token"))?;
    let mut config = BridgeConfig::new(connection.org_url.clone(), token);
    config.project = Some(connection.project.clone());
    config.plan_id = Some(connection.plan_id);
    Ok(config)
}

/// Bridge for phases that only touch the output directory.
fn offline_bridge(config: BridgeConfig) -> PlanBridge<RestPlanSource> {
    let source = RestPlanSource::new(&config);
    PlanBridge::new(config, source)
}

fn cmd_features(args: FeaturesArgs) -> Result<()> {
    let mut config = connect(&args.connection)?;
    config.out_dir = args.out_dir;
    let source = RestPlanSource::new(&config);
    let mut bridge = PlanBridge::new(config, source);
    bridge.populate().context("populate test plan")?;
    let written = bridge.write_feature_files().context("write feature documents")?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_runners(args: RunnersArgs) -> Result<()> {
    let mut config = BridgeConfig::new(String::new(), String::new());
    config.out_dir = args.out_dir;
    let bridge = offline_bridge(config);
    let written = bridge.write_runners().context("generate runner stubs")?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let mut config = BridgeConfig::new(String::new(), String::new());
    config.out_dir = args.out_dir;
    config.fixtures_dir = Some(args.fixtures);
    let bridge = offline_bridge(config);
    match bridge.validate_runners() {
        Ok(()) => {
            println!("all runner steps bound");
            Ok(())
        }
        Err(BridgeError::Validation { issues }) => {
            for issue in &issues {
                eprintln!("{issue}");
            }
            Err(BridgeError::Validation { issues }.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn cmd_graph(args: GraphArgs) -> Result<()> {
    let config = connect(&args.connection)?;
    let source = RestPlanSource::new(&config);
    let mut bridge = PlanBridge::new(config, source);
    bridge.populate().context("populate test plan")?;
    let graph = bridge.usage_graph().context("build usage graph")?;
    let dot = graph.to_dot();
    match args.out {
        Some(path) => {
            std::fs::write(&path, dot).with_context(|| format!("write {}", path.display()))?;
            println!("{}", path.display());
        }
        None => print!("{dot}"),
    }
    Ok(())
}
