#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = certcoach::run().await {
        eprintln!("certcoach fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
