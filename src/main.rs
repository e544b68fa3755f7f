// src/main.rs

use scriptrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("scriptrun error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    let default_level = if args.command.is_interactive() {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    logging::init_logging(args.log_level, default_level)?;
    run(args).await
}
