use std::env;
use weekly_report::{Config, app};

/// Main entry point for the report web application
///
/// Settings come from the `REPORT_*` environment variables; an optional first
/// argument overrides the workbook path.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let mut config = Config::from_env();
    if let Some(path) = args.get(1) {
        config = config.with_workbook_path(path);
    }

    app::run(config).await
}
