use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, CommandFactory, Parser};
use dotenv::dotenv;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use stellar_mc::{commands, parse, HorizonClient, McError, Network, NetworkContext, NETWORK_ENV_VAR};

/// Build and submit Stellar transactions from JSON descriptions.
///
/// The network is selected by the STELLAR_NETWORK environment variable
/// ("public" or "test", unset means "test").
///
/// ./mc --gen-keys foo; ./mc --fund $(cat foo.pub)
#[derive(Parser, Debug)]
#[command(name = "mc", version)]
#[command(group(
    ArgGroup::new("verb")
        .args(["fund", "gen_keys", "submit_tx", "change_trust", "send_payment", "account_details", "new_tx"])
        .multiple(false)
))]
struct Args {
    /// fund a test account. example: --fund address
    #[arg(long, value_name = "ADDRESS")]
    fund: Option<String>,

    /// create a pair of keys (in two files "file-path" and "file-path.pub"). example: --gen-keys file-path
    #[arg(long, value_name = "FILE_PATH")]
    gen_keys: Option<PathBuf>,

    /// submit a base64 encoded transaction. example: --submit-tx txn
    #[arg(long, value_name = "TXN")]
    submit_tx: Option<String>,

    /// create, update, or delete a trustline. "limit" is optional, setting it to "0" removes the trustline.
    /// example: --change-trust '{"source-account": "seed", "code": "XYZ", "issuer-address": "address", "limit": "42.0"}'
    #[arg(long, value_name = "JSON")]
    change_trust: Option<String>,

    /// send payment from one account to another.
    /// example: --send-payment '{"from": "seed", "to": "address", "token": "BTC", "amount": "42.0", "issuer": "address"}'
    #[arg(long, value_name = "JSON")]
    send_payment: Option<String>,

    /// load and return account details. example: --account-details address
    #[arg(long, value_name = "ADDRESS")]
    account_details: Option<String>,

    /// add one or more transaction options to a transaction built by another flag.
    /// example: --tx-options '{"home-domain": "stellar.org", "master-weight": 1, "inflation-destination": "address"}'
    #[arg(long, value_name = "JSON")]
    tx_options: Option<String>,

    /// build and submit a new transaction. "operations" and "signers" are optional, without "signers"
    /// the "source-account" seed signs. example: --new-tx '{"source-account": "address or seed",
    /// "operations": {"trust": {"code": "XYZ", "issuer-address": "address"}}, "signers": ["seed1", "seed2"]}'
    #[arg(long, value_name = "JSON")]
    new_tx: Option<String>,
}

impl Args {
    fn builds_transaction(&self) -> bool {
        self.send_payment.is_some() || self.change_trust.is_some() || self.new_tx.is_some()
    }
}

fn main() -> ExitCode {
    dotenv().ok();

    // Accepted `RUST_LOG` values are `trace`, `debug`, `info`, `warn`, and `error`.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), McError> {
    if args.tx_options.is_some() && !args.builds_transaction() {
        return Err(McError::Usage(
            "\"--tx-options\" can't be used by itself, it is an additional flag that should be used \
             with other flags that build transactions: i.e. \"--send-payment ... --tx-options ...\" \
             or \"--change-trust ... --tx-options ...\""
                .to_string(),
        ));
    }
    let network = Network::from_env_value(env::var(NETWORK_ENV_VAR).ok().as_deref())?;

    let options = match &args.tx_options {
        Some(doc) => parse::parse_options(doc)?,
        None => Vec::new(),
    };

    if let Some(path) = &args.gen_keys {
        commands::generate_keys(path)?;
        return Ok(());
    }

    let client = HorizonClient::new(NetworkContext::from(network))?;

    if let Some(address) = &args.fund {
        commands::fund_test_account(&client, address)?;
    } else if let Some(blob) = &args.submit_tx {
        println!("{}", commands::submit_raw(&client, blob)?);
    } else if let Some(address) = &args.account_details {
        println!("{}", commands::account_details(&client, address)?);
    } else if let Some(doc) = &args.send_payment {
        println!("{}", commands::send_payment(&client, doc, &options)?);
    } else if let Some(doc) = &args.change_trust {
        println!("{}", commands::change_trust(&client, doc, &options)?);
    } else if let Some(doc) = &args.new_tx {
        println!("{}", commands::new_transaction(&client, doc, &options)?);
    } else {
        Args::command().print_help()?;
    }
    Ok(())
}
