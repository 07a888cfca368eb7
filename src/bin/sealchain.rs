#![forbid(unsafe_code)]
//! SealChain command-line shell. Every subcommand loads the ledger from the
//! configured store, runs one operation, and saves it back.

use clap::{Parser, Subcommand};
use colored::*;
use sealchain::amount::{parse_amount, Amount};
use sealchain::blockchain::Blockchain;
use sealchain::cli::{
    balances_table, chain_table, load_ledger_from_config, shorten, transactions_table,
};
use sealchain::config::{Config, DEFAULT_CONFIG_FILE};
use sealchain::crypto::{Address, KeyPair};
use sealchain::error::ChainError;
use sealchain::logging::init_logging;
use sealchain::persistence::JsonFile;
use sealchain::transaction::Transaction;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sealchain", version, about = "Proof-of-work ledger with signed transfers")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a transfer and queue it as pending
    AddTx(TransferArgs),
    /// Mine all pending transactions into a new block
    Mine {
        /// Address credited with the mining reward
        reward_address: String,
    },
    /// Display every block in the chain
    Chain,
    /// Show the balance of one address
    Balance { address: String },
    /// Generate and register a new address
    NewAddress,
    /// List every address that ever transacted with its balance
    Balances,
    /// Sign a transfer, queue it, and mine it with the sender as reward address
    Send(TransferArgs),
    /// Export the ledger to a JSON file
    Save { file: PathBuf },
    /// Replace the ledger with one exported to a JSON file
    Load { file: PathBuf },
    /// List mined transactions involving an address
    History { address: String },
    /// Check every block's hash and link
    Verify,
}

#[derive(clap::Args)]
struct TransferArgs {
    /// Sending address
    #[arg(long)]
    from: String,
    /// Receiving address
    #[arg(long)]
    to: String,
    /// Amount to transfer, e.g. 0.4
    #[arg(long, value_parser = parse_amount)]
    amount: Amount,
    /// Sender's private key (64 hex). Looked up in the address book or
    /// prompted for when omitted.
    #[arg(long)]
    key: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ChainError> {
    let config = Config::load(&cli.config)?;
    init_logging(config.logging.format, &config.logging.level)?;

    let (store, mut chain) = load_ledger_from_config(&config)?;
    let dirty = execute(cli.command, &mut chain)?;
    if dirty {
        chain.save_to(store.as_ref())?;
    }
    Ok(())
}

/// Runs one subcommand. Returns whether the ledger changed.
fn execute(command: Command, chain: &mut Blockchain) -> Result<bool, ChainError> {
    match command {
        Command::AddTx(args) => {
            let tx = signed_transfer(chain, &args)?;
            println!("{} {}", "Queued transaction".green().bold(), tx.hash_str());
            Ok(true)
        }
        Command::Mine { reward_address } => {
            mine(chain, &Address::new(reward_address))?;
            Ok(true)
        }
        Command::Chain => {
            println!("{}", chain_table(chain.blocks()));
            let pending = chain.pending_transactions();
            if !pending.is_empty() {
                println!("\n{}", format!("Pending ({})", pending.len()).yellow().bold());
                println!("{}", transactions_table(&pending.iter().collect::<Vec<_>>()));
            }
            Ok(false)
        }
        Command::Balance { address } => {
            let address = Address::new(address);
            println!("{}: {}", address, chain.get_balance(&address).to_string().green().bold());
            Ok(false)
        }
        Command::NewAddress => {
            let (address, keypair) = chain.generate_address()?;
            println!("{} {}", "Address:    ".cyan(), address);
            println!("{} {}", "Private key:".cyan(), keypair.secret_hex().yellow());
            println!("{}", "Keep the private key secret; it signs every transfer.".dimmed());
            Ok(true)
        }
        Command::Balances => {
            println!("{}", balances_table(&chain.get_all_addresses_and_balances()));
            Ok(false)
        }
        Command::Send(args) => {
            let tx = signed_transfer(chain, &args)?;
            println!("{} {}", "Queued transaction".green().bold(), tx.hash_str());
            mine(chain, &tx.sender)?;
            Ok(true)
        }
        Command::Save { file } => {
            chain.save_to(&JsonFile::new(&file))?;
            println!("{} {}", "Exported ledger to".green(), file.display());
            Ok(false)
        }
        Command::Load { file } => {
            if !chain.load_from(&JsonFile::new(&file))? {
                return Err(ChainError::IoError(format!("{} does not exist", file.display())));
            }
            println!(
                "{} {} ({} blocks)",
                "Imported ledger from".green(),
                file.display(),
                chain.blocks().len()
            );
            Ok(true)
        }
        Command::History { address } => {
            let address = Address::new(address);
            let transactions = chain.find_transactions_for_address(&address);
            if transactions.is_empty() {
                println!("{}", format!("No transactions for {}", address).yellow());
            } else {
                println!("{}", transactions_table(&transactions));
            }
            Ok(false)
        }
        Command::Verify => {
            match chain.verify_chain() {
                Ok(()) => println!(
                    "{} {} blocks verified",
                    "✓".green().bold(),
                    chain.blocks().len()
                ),
                Err(e) => println!("{} {}", "✗".red().bold(), e.to_string().red()),
            }
            Ok(false)
        }
    }
}

fn mine(chain: &mut Blockchain, reward_address: &Address) -> Result<(), ChainError> {
    println!("{}", format!("Mining at difficulty {}...", chain.difficulty()).cyan());
    let start = Instant::now();
    let block = chain.mine_pending_transactions(reward_address)?;
    let elapsed = humantime::format_duration(std::time::Duration::from_millis(
        start.elapsed().as_millis() as u64,
    ));

    println!("{} #{}", "Mined block".green().bold(), block.index);
    println!("  hash:         {}", block.hash_str());
    println!("  nonce:        {}", block.nonce);
    println!("  transactions: {}", block.transactions.len());
    println!("  time:         {}", elapsed);
    Ok(())
}

/// Builds and signs a transfer, then queues it only if it is currently valid.
fn signed_transfer(chain: &mut Blockchain, args: &TransferArgs) -> Result<Transaction, ChainError> {
    let sender = Address::new(args.from.clone());
    let keypair = resolve_key(chain, &sender, args.key.as_deref())?;
    if keypair.address() != sender {
        return Err(ChainError::CryptoError(format!(
            "private key does not belong to {}",
            shorten(sender.as_str(), 16)
        )));
    }
    chain.send(&keypair, Address::new(args.to.clone()), args.amount)
}

fn resolve_key(chain: &Blockchain, sender: &Address, key: Option<&str>) -> Result<KeyPair, ChainError> {
    if let Some(key) = key {
        return KeyPair::from_secret_hex(key.trim());
    }
    if let Some(keypair) = chain.key_pair_for(sender) {
        return Ok(keypair);
    }
    let entered = rpassword::prompt_password(format!("Private key for {}: ", sender))?;
    let entered = entered.trim();
    if !chain.is_valid_private_key(entered) {
        return Err(ChainError::CryptoError(
            "private key must be 64 hex characters".to_string(),
        ));
    }
    KeyPair::from_secret_hex(entered)
}
