#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = gradecell::run().await {
        eprintln!("gradecell fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
