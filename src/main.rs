use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, LevelFilter};
use pow_ledger::{Command, Config, HashedKeyring, Keyring, Ledger, Opt, GLOBAL_CONFIG};
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(opt: &Opt) -> pow_ledger::Result<Config> {
    match &opt.config {
        Some(path) => Config::load(Some(path.as_path())),
        None => {
            let config = GLOBAL_CONFIG.clone();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&opt)?;
    let keyring: Arc<dyn Keyring> = Arc::new(HashedKeyring);

    match opt.command {
        Command::Createblockchain { address } => {
            let locking_key = keyring.locking_key_for(&address)?;
            Ledger::create_with_path(&locking_key, &config, keyring)?;
            println!("Done!");
        }
        Command::GetBalance { address } => {
            let locking_key = keyring.locking_key_for(&address)?;
            let ledger = Ledger::open_with_path(&config, Arc::clone(&keyring))?;
            let balance = ledger.get_balance(&locking_key)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send {
            from,
            to,
            amount,
            reward,
        } => {
            let to_locking_key = keyring.locking_key_for(&to)?;
            let reward_locking_key = match reward {
                Some(address) => Some(keyring.locking_key_for(&address)?),
                None => None,
            };
            let ledger = Ledger::open_with_path(&config, keyring)?;
            let block = match reward_locking_key {
                Some(reward_key) => {
                    ledger.send_with_reward(&from, &to_locking_key, amount, &reward_key)?
                }
                None => ledger.send(&from, &to_locking_key, amount)?,
            };
            println!("Success! Block {}", block.get_hash_hex());
        }
        Command::Mine { address } => {
            let locking_key = keyring.locking_key_for(&address)?;
            let ledger = Ledger::open_with_path(&config, keyring)?;
            let block = ledger.mine_block_with_reward(&[], &locking_key)?;
            println!("Mined block {}", block.get_hash_hex());
        }
        Command::Printchain => {
            let ledger = Ledger::open_with_path(&config, keyring)?;
            let pow = ledger.get_blockchain().get_pow().clone();
            for block in ledger.iterate_chain()? {
                let block = block?;
                println!("Pre block hash: {}", HEXLOWER.encode(block.get_pre_block_hash()));
                println!("Cur block hash: {}", block.get_hash_hex());
                println!("Cur block Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                println!("PoW: {}", pow.validate(&block));

                for tx in block.get_transactions() {
                    println!("- Transaction txid_hex: {}", HEXLOWER.encode(tx.get_id()));
                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            let vout = input
                                .get_vout()
                                .map_or_else(|| "-".to_string(), |v| v.to_string());
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                HEXLOWER.encode(input.get_txid()),
                                vout,
                                String::from_utf8_lossy(input.get_unlocking_key()),
                            )
                        }
                    }
                    for output in tx.get_vout() {
                        println!(
                            "-- Output value = {}, to = {}",
                            output.get_value(),
                            HEXLOWER.encode(output.get_locking_key()),
                        )
                    }
                }
                println!()
            }
        }
    }
    Ok(())
}
