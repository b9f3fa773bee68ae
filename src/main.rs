#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = grader_queue::run_worker().await {
        eprintln!("grader-queue worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
