#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agentdesk::server::run().await
}
