use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
pub struct MainArgs {
    /// The path to the config file for the drone system
    #[clap(long, short)]
    pub config: PathBuf,
}
