use portal_login::cli::{Args, try_load_dotenv};
use portal_login::runner::run;

use std::process::ExitCode;

use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env FIRST so clap's env fallbacks can see it
    let env_file = try_load_dotenv();
    let args = Args::parse();

    match run(args, env_file).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
