use anyhow::Result;
use kisan_api::{serve, ServerConfig};
use kisan_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("kisan_api");
    serve(ServerConfig::from_env()).await
}
