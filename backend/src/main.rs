#[tokio::main]
async fn main() -> anyhow::Result<()> {
    platform::start_server().await
}
