#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lingo_progress_backend::run().await
}
