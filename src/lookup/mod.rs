pub mod dexscreener;

use async_trait::async_trait;

use crate::error::LookupError;
use crate::models::{TokenMetadata, TokenProfile};

pub use dexscreener::DexScreenerClient;

/// Reports whether a token has an approved promotional profile
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn get_token_profile(&self, address: &str) -> Result<TokenProfile, LookupError>;
}

/// Resolves a token's display name and symbol
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// `Ok(None)` when the token is not indexed yet
    async fn get_token_metadata(&self, address: &str) -> Result<Option<TokenMetadata>, LookupError>;
}
