//! Stellar mc Library
//!
//! Builds, signs and submits Stellar transactions described as small JSON
//! documents instead of builder calls.
//!
//! # Example
//!
//! ```rust,no_run
//! use stellar_mc::{builder, parse, sign, HorizonClient, Network, NetworkContext};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HorizonClient::new(NetworkContext::from(Network::Test))?;
//! let request = parse::parse_payment(
//!     r#"{"from": "S...", "to": "G...", "token": "XYZ", "amount": "42.0", "issuer": "G..."}"#,
//! )?;
//!
//! let draft = builder::build(&request.source_account, client.network(), request.mutators, &client)?;
//! let envelope = sign::sign(draft, &request.signers)?;
//! let ledger = client.submit(&envelope)?.into_ledger()?;
//! println!("accepted in ledger {}", ledger);
//! # Ok(())
//! # }
//! ```

mod constant;

pub mod error;
pub mod types;

pub mod builder;
pub mod client;
pub mod commands;
pub mod keypair;
pub mod mutator;
pub mod parse;
pub mod sign;
pub mod xdr;

pub use client::HorizonClient;
pub use constant::NETWORK_ENV_VAR;
pub use error::{McError, ParseError, Result, TransportError};
pub use keypair::Keypair;
pub use mutator::Mutator;
pub use types::{AccountRecord, Network, NetworkContext, SubmissionResult};
