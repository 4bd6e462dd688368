use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::warn;

static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!(error = %e, "cl100k_base tokenizer unavailable, estimating tokens from bytes");
        None
    }
});

/// cl100k_base token count of `text`, or `None` when the encoder failed to load
#[must_use]
pub fn count_tokens(text: &str) -> Option<usize> {
    CL100K.as_ref().map(|bpe| bpe.encode_ordinary(text).len())
}

/// Whether estimates come from the BPE encoder rather than the byte ratio
#[must_use]
pub fn tokenizer_available() -> bool {
    CL100K.is_some()
}
