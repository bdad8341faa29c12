#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boop_shell::run().await
}
