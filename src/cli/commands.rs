use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pow-ledger")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new ledger")]
    Createblockchain {
        #[arg(help = "The identity to send the genesis reward to")]
        address: String,
    },
    #[command(name = "getbalance", about = "Get the balance of an identity")]
    GetBalance {
        #[arg(help = "The identity to query")]
        address: String,
    },
    #[command(name = "send", about = "Send value between identities and mine it")]
    Send {
        #[arg(help = "Source identity")]
        from: String,
        #[arg(help = "Destination identity")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(long, help = "Also pay the block subsidy to this identity")]
        reward: Option<String>,
    },
    #[command(name = "mine", about = "Mine a block holding only a reward coinbase")]
    Mine {
        #[arg(help = "The identity to receive the reward")]
        address: String,
    },
    #[command(name = "printchain", about = "Print all blocks, newest first")]
    Printchain,
}
