/// Token cost charged for one backend operation.
///
/// The most expensive class defines the capacity of the global bucket, so every class can
/// always be admitted eventually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCost {
    /// Metadata and cheap lookups (`Version`, mempool reads, address conversion).
    Basic,
    /// Wallet balance queries.
    Wallet,
    /// Chain reads: tip sets, blocks, messages.
    Chain,
    /// State tree reads and actor inspection.
    State,
}

impl TokenCost {
    pub const BASIC_TOKENS: u32 = 1;
    pub const WALLET_TOKENS: u32 = 1;
    pub const CHAIN_TOKENS: u32 = 2;
    pub const STATE_TOKENS: u32 = 3;

    /// Tokens consumed by the most expensive operation class.
    pub const MAX_TOKENS: u32 = Self::STATE_TOKENS;

    pub const ALL: [Self; 4] = [Self::Basic, Self::Wallet, Self::Chain, Self::State];

    #[inline]
    #[must_use]
    pub const fn tokens(self) -> u32 {
        match self {
            Self::Basic => Self::BASIC_TOKENS,
            Self::Wallet => Self::WALLET_TOKENS,
            Self::Chain => Self::CHAIN_TOKENS,
            Self::State => Self::STATE_TOKENS,
        }
    }

    /// Classifies a backend method by its namespace.
    ///
    /// `Wallet*` → wallet, `State*`/`Msig*`/`Miner*` → state, `Chain*`/`Eth*`/`Gas*` → chain,
    /// anything else → basic.
    #[must_use]
    pub fn for_method(method: &str) -> Self {
        const STATE_PREFIXES: [&str; 3] = ["State", "Msig", "Miner"];
        const CHAIN_PREFIXES: [&str; 3] = ["Chain", "Eth", "Gas"];

        let method = method.strip_prefix("Filecoin.").unwrap_or(method);
        if method.starts_with("Wallet") {
            Self::Wallet
        } else if STATE_PREFIXES.iter().any(|p| method.starts_with(p)) {
            Self::State
        } else if CHAIN_PREFIXES.iter().any(|p| method.starts_with(p)) {
            Self::Chain
        } else {
            Self::Basic
        }
    }

    /// Label used in metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Wallet => "wallet",
            Self::Chain => "chain",
            Self::State => "state",
        }
    }
}
