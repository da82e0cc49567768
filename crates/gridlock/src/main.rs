//! Binary entry point for the Gridlock game server.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_gridlock::init().await
}
