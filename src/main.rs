use crawlmaster::master_start;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    master_start().await
}
