use serde::{Deserialize, Serialize};
use std::fmt;

/// Promotion tier of a newly launched token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Not a candidate token; never notified
    Rejected,
    /// Candidate without an approved promotional profile
    Unverified,
    /// Candidate with an approved promotional profile
    Verified,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Rejected => "Rejected",
            Tier::Unverified => "Unverified",
            Tier::Verified => "Verified",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub tier: Tier,
    pub token_address: Option<String>,
    pub pair_address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

impl ClassificationResult {
    pub fn rejected() -> Self {
        Self {
            tier: Tier::Rejected,
            token_address: None,
            pair_address: None,
            name: None,
            symbol: None,
        }
    }

    pub fn is_notifiable(&self) -> bool {
        self.tier != Tier::Rejected && self.token_address.is_some()
    }
}

/// Answer of the promotional profile lookup
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenProfile {
    pub approved: bool,
}

/// Human-readable token identity from the metadata lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
}
