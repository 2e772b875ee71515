//! Shared plumbing for the HTTP embedding providers
//!
//! Input preprocessing, transparent sub-batching that preserves order,
//! bounded retries with exponential backoff, and HTTP status classification
//! into the embedding error taxonomy.

use std::future::Future;
use std::time::Duration;

use codectx_domain::constants::{EMBED_BACKOFF_BASE_MS, EMBED_CHARS_PER_TOKEN, EMBED_MAX_RETRIES};
use codectx_domain::error::{Error, Result};
use codectx_domain::types::Embedding;
use reqwest::StatusCode;

/// Preprocess inputs: empty strings become a single space, overlong inputs
/// are truncated to the provider's approximate character budget.
pub(crate) fn prepare_inputs(texts: &[String], max_tokens: usize) -> Vec<String> {
    let budget = max_tokens.saturating_mul(EMBED_CHARS_PER_TOKEN);
    texts
        .iter()
        .map(|text| {
            if text.is_empty() {
                " ".to_string()
            } else if text.chars().count() > budget {
                text.chars().take(budget).collect()
            } else {
                text.clone()
            }
        })
        .collect()
}

/// Run one provider call with bounded retries on transient failures.
///
/// Authentication and invalid-response failures are surfaced immediately.
pub(crate) async fn with_retries<F, Fut>(provider: &str, op: F) -> Result<Vec<Embedding>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<Embedding>>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(embeddings) => return Ok(embeddings),
            Err(e) if e.is_retryable() && attempt < EMBED_MAX_RETRIES => {
                let delay = Duration::from_millis(EMBED_BACKOFF_BASE_MS << attempt);
                tracing::warn!(
                    "{} embedding attempt {} failed ({}); retrying in {:?}",
                    provider,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Split `texts` into provider-sized slices, embed each with retries, and
/// reassemble the outputs in input order.
pub(crate) async fn embed_in_slices<F, Fut>(
    provider: &str,
    texts: &[String],
    max_batch: usize,
    call: F,
) -> Result<Vec<Embedding>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<Embedding>>>,
{
    let mut out = Vec::with_capacity(texts.len());
    for slice in texts.chunks(max_batch.max(1)) {
        let embeddings = with_retries(provider, || call(slice.to_vec())).await?;
        if embeddings.len() != slice.len() {
            return Err(Error::embedding_invalid_response(format!(
                "{} returned {} embeddings for {} inputs",
                provider,
                embeddings.len(),
                slice.len()
            )));
        }
        out.extend(embeddings);
    }
    Ok(out)
}

/// Map a reqwest failure to the embedding taxonomy
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::embedding_transport(format!("{provider} request timed out: {e}"))
    } else {
        Error::embedding_transport(format!("{provider} request failed: {e}"))
    }
}

/// Classify the HTTP status and parse the JSON body on success
pub(crate) async fn check_and_parse(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::embedding_auth(format!(
            "{provider} rejected credentials ({status}): {body}"
        )));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::embedding_rate_limited(format!(
            "{provider} rate limited the request: {body}"
        )));
    }
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::embedding_transport(format!(
            "{provider} server error {status}: {body}"
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::embedding_invalid_response(format!(
            "{provider} error {status}: {body}"
        )));
    }
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::embedding_invalid_response(format!("{provider} sent unparseable JSON: {e}")))
}

/// Extract a `[f32]` vector from a JSON array of numbers
pub(crate) fn parse_vector(provider: &str, value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| {
            Error::embedding_invalid_response(format!("{provider} embedding is not an array"))
        })
        .map(|values| {
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_input_becomes_single_space() {
        let prepared = prepare_inputs(&["".to_string(), "code".to_string()], 10);
        assert_eq!(prepared, vec![" ".to_string(), "code".to_string()]);
    }

    #[test]
    fn overlong_input_is_truncated_at_char_boundary() {
        let text = "é".repeat(100);
        let prepared = prepare_inputs(&[text], 10);
        assert_eq!(prepared[0].chars().count(), 40);
    }

    #[tokio::test]
    async fn slices_preserve_order_across_sub_batches() {
        let texts: Vec<String> = (0..7).map(|i| format!("t{i}")).collect();
        let calls = AtomicUsize::new(0);

        let out = embed_in_slices("test", &texts, 3, |batch| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(batch
                    .iter()
                    .map(|t| Embedding {
                        vector: vec![t.trim_start_matches('t').parse::<f32>().unwrap()],
                        model: "test".into(),
                        dimensions: 1,
                    })
                    .collect())
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let order: Vec<f32> = out.iter().map(|e| e.vector[0]).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_then_succeed() {
        let attempts = AtomicUsize::new(0);
        let out = with_retries("test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::embedding_transport("flaky"))
                } else {
                    Ok(vec![Embedding::default()])
                }
            }
        })
        .await;
        assert!(out.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let out = with_retries("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::embedding_auth("bad key")) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn count_mismatch_is_invalid_response() {
        let out = embed_in_slices("test", &["a".to_string(), "b".to_string()], 10, |_| async {
            Ok(vec![Embedding::default()])
        })
        .await;
        assert!(matches!(out, Err(Error::Embedding { .. })));
    }
}
