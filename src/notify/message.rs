use crate::config::TelegramConfig;
use crate::models::{ClassificationResult, Tier};

/// Escape characters that legacy Telegram Markdown treats as markup
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Text placed inside a `*bold*` entity. Legacy Markdown takes no escapes
/// there, so only the closing delimiter has to go.
fn bold_text(text: &str) -> String {
    text.replace('*', "")
}

/// Renders the new-pool announcement
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    market_url_template: String,
    primary_bot_url_template: String,
    secondary_bot_url_template: String,
}

impl MessageFormatter {
    pub fn new(market: &str, primary_bot: &str, secondary_bot: &str) -> Self {
        Self {
            market_url_template: market.to_string(),
            primary_bot_url_template: primary_bot.to_string(),
            secondary_bot_url_template: secondary_bot.to_string(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(
            &config.market_url_template,
            &config.primary_bot_url_template,
            &config.secondary_bot_url_template,
        )
    }

    fn link(template: &str, token: &str, pair: &str) -> String {
        template.replace("{token}", token).replace("{pair}", pair)
    }

    /// Body for a classified pool; `None` for rejected or token-less results
    pub fn format(&self, result: &ClassificationResult) -> Option<String> {
        if !result.is_notifiable() {
            return None;
        }
        let token = result.token_address.as_deref()?;
        Some(self.render(
            result.tier,
            token,
            result.pair_address.as_deref(),
            result.name.as_deref(),
            result.symbol.as_deref(),
        ))
    }

    pub fn render(
        &self,
        tier: Tier,
        token: &str,
        pair: Option<&str>,
        name: Option<&str>,
        symbol: Option<&str>,
    ) -> String {
        // Without a pool address the market link points at the token page
        let pair = pair.unwrap_or(token);
        let mut lines = vec!["🔥 *New Pool*".to_string()];

        let header = match (symbol, name) {
            (Some(symbol), Some(name)) => {
                Some(format!("💎 *{}* | {}", bold_text(symbol), escape_markdown(name)))
            }
            (Some(symbol), None) => Some(format!("💎 *{}*", bold_text(symbol))),
            (None, Some(name)) => Some(format!("💎 {}", escape_markdown(name))),
            (None, None) => None,
        };
        lines.extend(header);

        lines.push(format!("⚡️ CA: `{}`", token));

        if tier == Tier::Verified {
            lines.push("✅ Dexpaid".to_string());
        }

        lines.push(format!(
            "[DEX]({}) | [Bonk Bot]({}) | [Trojan Bot]({})",
            Self::link(&self.market_url_template, token, pair),
            Self::link(&self.primary_bot_url_template, token, pair),
            Self::link(&self.secondary_bot_url_template, token, pair),
        ));

        lines.join("\n")
    }
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::from_config(&TelegramConfig::default())
    }
}
