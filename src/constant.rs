pub const PUBLIC_NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
pub const TEST_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

pub const PUBLIC_HORIZON_URL: &str = "https://horizon.stellar.org";
pub const TEST_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

/// Environment variable selecting the network
pub const NETWORK_ENV_VAR: &str = "STELLAR_NETWORK";

/// Strkey version bytes (already shifted into the top five bits)
pub const VERSION_BYTE_ACCOUNT_ID: u8 = 6 << 3; // 'G'
pub const VERSION_BYTE_SEED: u8 = 18 << 3; // 'S'

/// Fee charged per operation, in stroops
pub const BASE_FEE: u32 = 100;

/// 1 unit = 10^7 stroops
pub const STROOP_SCALE: u32 = 7;

pub const MAX_HOME_DOMAIN_LEN: usize = 32;
pub const MAX_OPERATIONS: usize = 100;
pub const MAX_SIGNATURES: usize = 20;
