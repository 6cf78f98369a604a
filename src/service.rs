//! External collaborator seams: the image generation service, the field
//! suggestion service, and the retry policy applied to transient failures.

use std::{collections::BTreeMap, time::Duration};

use crate::{
    block::BlockState,
    core::{AspectRatio, Frame},
    error::{MuralError, MuralResult},
};

/// Everything the generation backend needs. The prompt is already
/// compiled; block state never crosses this boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub seed: u64,
    pub aspect_ratio: AspectRatio,
    /// Previous render, for edit-style requests that refine an image.
    pub previous_image: Option<String>,
    /// Per-block reference images, in effective block order.
    pub reference_images: Vec<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, seed: u64, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            seed,
            aspect_ratio,
            previous_image: None,
            reference_images: Vec::new(),
        }
    }

    pub fn with_previous_image(mut self, image: impl Into<String>) -> Self {
        self.previous_image = Some(image.into());
        self
    }

    /// Collect reference images attached to the effective blocks.
    pub fn with_block_references(mut self, effective: &[&BlockState]) -> Self {
        self.reference_images = effective
            .iter()
            .filter_map(|b| b.reference_image.clone())
            .collect();
        self
    }
}

/// Opaque image generation backend. Implementations map their transport
/// failures onto the error taxonomy: bad credentials are
/// [`MuralError::Configuration`], quota exhaustion is
/// [`MuralError::RateLimited`], overload is [`MuralError::Transient`].
pub trait ImageService {
    fn generate(&self, request: &GenerateRequest) -> MuralResult<Frame>;
}

/// Key for a suggestion bucket: `"<BlockType>:<sectionId>:<fieldId>"`.
pub fn suggestion_key(block_type: &str, section_id: &str, field_id: &str) -> String {
    format!("{block_type}:{section_id}:{field_id}")
}

/// Context-driven field suggestions. Partial and empty results are fine;
/// callers merge whatever comes back.
pub trait SuggestionService {
    fn suggest(&self, context: &str) -> MuralResult<BTreeMap<String, Vec<String>>>;
}

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Run `op`, retrying only [`MuralError::Transient`] failures with
/// exponential backoff. Other error kinds surface immediately. `sleep` is
/// injected so tests can observe the schedule without waiting.
#[tracing::instrument(skip(sleep, op))]
pub fn with_retry<T>(
    attempts: u32,
    mut sleep: impl FnMut(Duration),
    mut op: impl FnMut() -> MuralResult<T>,
) -> MuralResult<T> {
    let attempts = attempts.max(1);
    let mut delay = RETRY_BASE_DELAY;
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::warn!(attempt, %err, "transient failure, retrying");
                sleep(delay);
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    Err(MuralError::evaluation("retry loop exhausted without a result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_recovers_from_transient_failures() {
        let calls = Cell::new(0u32);
        let mut delays = Vec::new();
        let result = with_retry(
            3,
            |d| delays.push(d),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(MuralError::transient("overloaded"))
                } else {
                    Ok(calls.get())
                }
            },
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            delays,
            vec![Duration::from_millis(250), Duration::from_millis(500)]
        );
    }

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let calls = Cell::new(0u32);
        let result: MuralResult<()> = with_retry(
            3,
            |_| {},
            || {
                calls.set(calls.get() + 1);
                Err(MuralError::transient("still overloaded"))
            },
        );
        assert!(matches!(result, Err(MuralError::Transient(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_transient_errors_fail_fast() {
        let calls = Cell::new(0u32);
        let result: MuralResult<()> = with_retry(
            5,
            |_| {},
            || {
                calls.set(calls.get() + 1);
                Err(MuralError::rate_limited("quota exhausted"))
            },
        );
        assert!(matches!(result, Err(MuralError::RateLimited(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn suggestion_key_shape() {
        assert_eq!(
            suggestion_key("Subject", "identity", "role"),
            "Subject:identity:role"
        );
    }
}
