use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    NotEnoughInterests { available: usize, required: usize },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::NotEnoughInterests { available, required } => write!(
                f,
                "not enough distinct interests ({} available, {} required)",
                available, required
            ),
        }
    }
}

impl std::error::Error for SampleError {}

/// Remove every whitespace char and lowercase: `"Machine Learning"` -> `"machinelearning"`
pub fn normalize_interest(tag: &str) -> String {
    tag.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Normalized, non-empty, first-occurrence-wins distinct tags
pub fn distinct_interests(interests: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::with_capacity(interests.len());
    for tag in interests {
        let normalized = normalize_interest(tag);
        if !normalized.is_empty() && !distinct.contains(&normalized) {
            distinct.push(normalized);
        }
    }
    distinct
}

/// Pick `count` distinct normalized interests without replacement.
pub fn sample_interests(interests: &[String], count: usize) -> Result<Vec<String>, SampleError> {
    let mut rng = rand::rng();
    sample_interests_with(interests, count, &mut rng)
}

pub fn sample_interests_with<R: Rng + ?Sized>(
    interests: &[String],
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>, SampleError> {
    let mut pool = distinct_interests(interests);

    if pool.len() < count {
        return Err(SampleError::NotEnoughInterests {
            available: pool.len(),
            required: count,
        });
    }

    pool.shuffle(rng);
    pool.truncate(count);
    Ok(pool)
}
