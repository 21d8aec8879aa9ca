use serde_json::json;
use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::error::{FailureCategory, LookupError};
use crate::logging::LogContext;
use crate::lookup::{MetadataLookup, ProfileLookup};
use crate::models::{ClassificationResult, Tier, TokenMetadata};

/// Decides the token role and promotion tier of a new pool
pub struct TokenClassifier {
    profiles: Arc<dyn ProfileLookup>,
    metadata: Arc<dyn MetadataLookup>,
    config: ClassifierConfig,
}

impl TokenClassifier {
    pub fn new(
        profiles: Arc<dyn ProfileLookup>,
        metadata: Arc<dyn MetadataLookup>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            profiles,
            metadata,
            config,
        }
    }

    /// The suffixed mint (side A checked first) and the pool address, if any
    pub fn candidate(&self, accounts: &[String]) -> Option<(String, Option<String>)> {
        let mint_a = accounts.get(self.config.mint_a_index)?;
        let mint_b = accounts.get(self.config.mint_b_index)?;
        let token = self.pick_token(mint_a, mint_b)?;

        let pair = accounts.get(self.config.pair_index).cloned();
        Some((token.to_string(), pair))
    }

    /// Side A wins when both mints carry the suffix
    pub fn pick_token<'a>(&self, mint_a: &'a str, mint_b: &'a str) -> Option<&'a str> {
        let suffix = self.config.token_suffix.as_str();
        if mint_a.ends_with(suffix) {
            Some(mint_a)
        } else if mint_b.ends_with(suffix) {
            Some(mint_b)
        } else {
            None
        }
    }

    pub async fn classify(&self, accounts: &[String]) -> ClassificationResult {
        let Some((token, pair)) = self.candidate(accounts) else {
            LogContext::new("token_classifier", "classify")
                .with_metadata("account_count", json!(accounts.len()))
                .debug("No candidate token among pool mints");
            return ClassificationResult::rejected();
        };
        self.classify_token(token, pair).await
    }

    /// Look up profile and metadata for an already selected token
    pub async fn classify_token(&self, token: String, pair: Option<String>) -> ClassificationResult {
        let metadata_lookup = async {
            if self.config.enable_metadata_lookup {
                self.metadata.get_token_metadata(&token).await
            } else {
                Ok(None)
            }
        };

        let (profile, metadata) = tokio::join!(self.profiles.get_token_profile(&token), metadata_lookup);

        let tier = match profile {
            Ok(profile) if profile.approved => Tier::Verified,
            Ok(_) => Tier::Unverified,
            Err(e) => {
                log_degraded("profile", &token, &e);
                Tier::Unverified
            }
        };

        let TokenMetadata { name, symbol } = match metadata {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                log_degraded("metadata", &token, &e);
                TokenMetadata::default()
            }
        };

        LogContext::new("token_classifier", "classify")
            .with_token_address(&token)
            .with_tier(&tier.to_string())
            .info(&format!("Classified {} as {}", token, tier));

        ClassificationResult {
            tier,
            token_address: Some(token),
            pair_address: pair,
            name,
            symbol,
        }
    }
}

fn log_degraded(kind: &str, token: &str, error: &LookupError) {
    LogContext::new("token_classifier", "lookup")
        .with_token_address(token)
        .with_metadata("lookup", json!(kind))
        .with_metadata("category", json!(format!("{:?}", FailureCategory::LookupDegraded)))
        .warn(&format!("Error fetching token {}: {}", kind, error));
}
