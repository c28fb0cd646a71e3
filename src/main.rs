#[tokio::main]
async fn main() -> anyhow::Result<()> {
    outfitdist_lib::run().await
}
