mod cli;
mod config;
mod ipc;
mod landmarks;
mod logging;
mod scene;
mod signals;
mod source;
mod wishes;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
