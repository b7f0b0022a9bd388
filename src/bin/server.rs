use project_analyzer::error::Result;
use project_analyzer::{logging, server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let config = Config::load()?;
    server::serve(config).await
}
