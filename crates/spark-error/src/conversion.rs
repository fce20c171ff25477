// Error conversion utilities
// Flattens foreign error chains into the text the status classifier inspects

use std::error::Error as StdError;

use crate::RetrievalError;

/// Render an error together with every error in its `source()` chain.
///
/// HTTP client errors only carry the interesting part ("dns error",
/// "tcp connect error") a few levels down the chain, so the top-level
/// `Display` alone is not enough to classify them.
pub fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}

/// Convert any transport-level failure into a `RetrievalError::Transport`
pub fn transport_error<E>(err: E) -> RetrievalError
where
    E: StdError + 'static,
{
    RetrievalError::Transport(error_chain_message(&err))
}
