#[tokio::main]
async fn main() -> std::io::Result<()> {
    arena_shooter::run_with_config().await
}
