#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = grader_queue::run_queue_admin().await {
        eprintln!("queue_admin: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
