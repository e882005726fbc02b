//! AIWisper client
//!
//! Main entry point for the command-line client.

fn main() -> anyhow::Result<()> {
    aiwisper_client::run()
}
