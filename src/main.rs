mod config;
mod core;
mod ewmh;
mod keys;
mod spawn;
mod window;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::context::Context;
use crate::window::manager::WindowManager;

#[derive(Parser, Debug)]
#[command(version, about = "stackwm, a dynamic tiling window manager for X11")]
struct Args {
    /// Desktop selected at startup
    #[arg(long, default_value_t = 1)]
    desktop: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cfg = Config::default();

    spawn::install_sigchld().map_err(|e| {
        error!("failed to install SIGCHLD handler: {e}");
        e
    })?;

    let ctx = Context::new(&cfg).map_err(|e| {
        error!("startup failed: {e}");
        e
    })?;

    ewmh::setup::setup_hints(&ctx, &cfg)?;

    let mut wm = WindowManager::new(ctx, cfg)?;
    wm.scan_windows()?;
    wm.startup(args.desktop)?;
    wm.run()
}
