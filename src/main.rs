use anyhow::Result;

fn main() -> Result<()> {
    chat_atlas::telemetry::init_tracing();
    chat_atlas::cli::run()
}
