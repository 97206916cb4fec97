#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_agent::cli::run().await
}
