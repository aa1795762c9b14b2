use anyhow::{Context, Result};
use clap::Parser;
use gitgate::commandargs::{self, CommandType};
use gitgate::{commands, Config, Gateway};
use gitgate_net::sshenv::Env;
use gitgate_net::verifier::Verifier;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitgate")]
#[command(about = "SSH-facing git gateway", long_about = None)]
struct Cli {
    /// Identity of the connecting key or user, e.g. key-123
    who: String,
}

fn init_logging(config: &Config) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            // Errors are user-facing: the SSH client shows stderr verbatim.
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config)?;

    let env = Env::capture();
    let args = commandargs::parse(&env.original_command)?;

    let gateway = Gateway::new(config);
    let verifier = Verifier::new(gateway.internal_client()?);
    let decision = verifier
        .verify(&cli.who, args.command.as_str(), &args.repo, &env)
        .await?;

    info!(
        command = args.command.as_str(),
        repo = %args.repo,
        who = %cli.who,
        relayed = decision.payload.is_some(),
        "access granted"
    );

    let exit_code = match args.command {
        CommandType::ReceivePack => commands::receive_pack::run(&gateway, &decision, &env).await?,
        CommandType::UploadPack => commands::upload_pack::run(&gateway, &decision, &env).await?,
        CommandType::UploadArchive => {
            commands::upload_archive::run(&gateway, &decision, &env).await?
        }
    };
    Ok(exit_code)
}
