#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = gradecell::run_harness().await {
        eprintln!("harness fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
