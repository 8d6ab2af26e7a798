use commerce_core::observability::init_logging;
use payment_service::{config::Config, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info,payment_service=debug");

    let config = Config::from_env()?;
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
