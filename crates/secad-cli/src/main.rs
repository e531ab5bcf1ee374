//! `secad` command-line entry point

use secad_cli::{command, init_tracing, log_settings, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = command().get_matches();

    let (format, level) = log_settings(&matches)?;
    init_tracing(format, &level)?;

    let code = run(&matches, &mut std::io::stdout()).await?;
    std::process::exit(code);
}
