use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    acervo::logging::init().context("init logging")?;

    let cli = acervo::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = cli.content.resolve().context("load config")?;
    tracing::debug!(?config, "resolved config");

    match cli.command {
        acervo::cli::Command::Catalog(args) => {
            acervo::catalog::run(args, &config)
                .await
                .context("catalog")?;
        }
        acervo::cli::Command::Read(args) => {
            acervo::reader::run(args, &config).await.context("read")?;
        }
        acervo::cli::Command::Reviews { command } => {
            acervo::reviews::run(command, &config)
                .await
                .context("reviews")?;
        }
        acervo::cli::Command::Author(args) => {
            acervo::author::run(args, &config).await.context("author")?;
        }
        acervo::cli::Command::Schema { command } => {
            acervo::schema::run(command).await.context("schema")?;
        }
    }

    Ok(())
}
