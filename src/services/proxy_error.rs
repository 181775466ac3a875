use thiserror::Error;

use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error(transparent)]
    Upstream(#[from] ProviderError),
}
