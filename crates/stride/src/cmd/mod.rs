//! Command implementations for the Stride CLI

use clap::Args;

pub mod compute;
pub mod info;
pub mod link;
pub mod list;
pub mod reset;
#[cfg(unix)]
pub mod serve;
pub mod status;
pub mod stop;
pub mod sync;

/// Where the background runs
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ConnectArgs {
    /// Talk to a running `stride serve` instead of an in-process engine
    #[arg(long)]
    pub connect: bool,
}
