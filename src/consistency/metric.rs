//! Pairwise distances between filtered agent states.
//!
//! All built-in metrics treat their inputs as sets: duplicates collapse and
//! order does not matter. A distance of 0 means the two states agree.

use std::collections::HashSet;
use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};

use crate::error::ConsistencyError;
use crate::term::Literal;

/// Distance between two filtered states.
pub trait Metric: Send + Sync {
    /// Label used in logs and errors.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns `ConsistencyError::MetricFailed` if the distance cannot be
    /// computed; the recompute then marks both agents stale.
    fn distance(&self, left: &[Literal], right: &[Literal]) -> Result<f64, ConsistencyError>;
}

fn sets<'a>(left: &'a [Literal], right: &'a [Literal]) -> (HashSet<&'a Literal>, HashSet<&'a Literal>) {
    (left.iter().collect(), right.iter().collect())
}

/// `|A △ B|`
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricDifference;

impl Metric for SymmetricDifference {
    fn name(&self) -> &str {
        "symmetric_difference"
    }

    #[allow(clippy::cast_precision_loss)]
    fn distance(&self, left: &[Literal], right: &[Literal]) -> Result<f64, ConsistencyError> {
        let (a, b) = sets(left, right);
        Ok(a.symmetric_difference(&b).count() as f64)
    }
}

/// `4·|A ∪ B| + |A △ B| / |A ∩ B|`, or `|A △ B|` when the intersection is
/// empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedDifference;

impl Metric for WeightedDifference {
    fn name(&self) -> &str {
        "weighted_difference"
    }

    #[allow(clippy::cast_precision_loss)]
    fn distance(&self, left: &[Literal], right: &[Literal]) -> Result<f64, ConsistencyError> {
        let (a, b) = sets(left, right);
        let difference = a.symmetric_difference(&b).count() as f64;
        let intersection = a.intersection(&b).count();
        if intersection == 0 {
            return Ok(difference);
        }
        let union = a.union(&b).count() as f64;
        Ok(4.0f64.mul_add(union, difference / intersection as f64))
    }
}

/// Encoder used by [`CompressionDistance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Deflate,
    Gzip,
    Zlib,
}

impl Compression {
    fn compressed_len(self, data: &[u8]) -> std::io::Result<usize> {
        let level = flate2::Compression::best();
        let bytes = match self {
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
        };
        Ok(bytes.len())
    }
}

/// Normalised compression distance over the canonical text of each state:
/// `(C(xy) - min(C(x), C(y))) / max(C(x), C(y))`.
///
/// The text is the sorted, de-duplicated literal strings joined by newlines,
/// so equal sets compare equal regardless of order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionDistance {
    pub compression: Compression,
}

impl CompressionDistance {
    #[must_use]
    pub const fn new(compression: Compression) -> Self {
        Self { compression }
    }

    fn fail(&self, error: &std::io::Error) -> ConsistencyError {
        ConsistencyError::MetricFailed {
            metric: self.name().to_string(),
            reason: error.to_string(),
        }
    }
}

fn canonical(literals: &[Literal]) -> String {
    let mut lines: Vec<String> = literals.iter().map(ToString::to_string).collect();
    lines.sort_unstable();
    lines.dedup();
    lines.join("\n")
}

impl Metric for CompressionDistance {
    fn name(&self) -> &str {
        "compression_distance"
    }

    #[allow(clippy::cast_precision_loss)]
    fn distance(&self, left: &[Literal], right: &[Literal]) -> Result<f64, ConsistencyError> {
        let x = canonical(left);
        let y = canonical(right);
        if x == y {
            return Ok(0.0);
        }
        let cx = self.compression.compressed_len(x.as_bytes()).map_err(|e| self.fail(&e))?;
        let cy = self.compression.compressed_len(y.as_bytes()).map_err(|e| self.fail(&e))?;
        let joined = format!("{x}\n{y}");
        let cxy = self
            .compression
            .compressed_len(joined.as_bytes())
            .map_err(|e| self.fail(&e))?;
        let (low, high) = (cx.min(cy) as f64, cx.max(cy) as f64);
        if high == 0.0 {
            return Ok(0.0);
        }
        Ok(((cxy as f64 - low) / high).max(0.0))
    }
}

impl<F> Metric for F
where
    F: Fn(&[Literal], &[Literal]) -> Result<f64, ConsistencyError> + Send + Sync,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn distance(&self, left: &[Literal], right: &[Literal]) -> Result<f64, ConsistencyError> {
        self(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn facts(names: &[&str]) -> Vec<Literal> {
        names.iter().map(|n| Literal::new(n, vec![Term::number(1.0)])).collect()
    }

    #[test]
    fn test_symmetric_difference() {
        let a = facts(&["a", "b", "c"]);
        let b = facts(&["b", "c", "d", "e"]);
        assert_eq!(SymmetricDifference.distance(&a, &b).unwrap(), 3.0);
        assert_eq!(SymmetricDifference.distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_weighted_difference() {
        let six = facts(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(WeightedDifference.distance(&six, &six).unwrap(), 24.0);

        let seven = facts(&["a", "b", "c", "d", "e", "f", "g"]);
        let d = WeightedDifference.distance(&six, &seven).unwrap();
        assert!((d - (28.0 + 1.0 / 6.0)).abs() < 1e-12);

        // disjoint sets fall back to the symmetric difference
        let other = facts(&["x", "y"]);
        assert_eq!(WeightedDifference.distance(&six, &other).unwrap(), 8.0);
    }

    #[test]
    fn test_compression_distance() {
        let a = facts(&["alpha", "beta", "gamma"]);
        let mut reordered = a.clone();
        reordered.reverse();
        for compression in [Compression::Deflate, Compression::Gzip, Compression::Zlib] {
            let metric = CompressionDistance::new(compression);
            assert_eq!(metric.distance(&a, &reordered).unwrap(), 0.0);
            let far = facts(&["zeta", "eta", "theta", "iota"]);
            assert!(metric.distance(&a, &far).unwrap() > 0.0);
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_closure_metric() {
        let sizes = |a: &[Literal], b: &[Literal]| -> Result<f64, ConsistencyError> {
            Ok((a.len() as f64 - b.len() as f64).abs())
        };
        assert_eq!(sizes.name(), "custom");
        assert_eq!(sizes.distance(&facts(&["a"]), &facts(&["a", "b"])).unwrap(), 1.0);
    }
}
