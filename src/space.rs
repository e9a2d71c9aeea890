//! Distance spaces and the space factory

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::params::Params;

/// A distance function over fixed-width float vectors.
///
/// Smaller values mean closer. Implementations assume equal-length inputs;
/// dimensionality is validated by the engine before any distance call.
pub trait Space: Send + Sync {
    /// Factory tag this space was created under.
    fn name(&self) -> &'static str;

    /// Distance from `a` to `b`.
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

impl std::fmt::Debug for dyn Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Space").field("name", &self.name()).finish()
    }
}

/// Euclidean distance.
struct L2;

impl Space for L2 {
    fn name(&self) -> &'static str {
        "l2"
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

/// Manhattan distance.
struct L1;

impl Space for L1 {
    fn name(&self) -> &'static str {
        "l1"
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
    }
}

/// Chebyshev distance.
struct LInf;

impl Space for LInf {
    fn name(&self) -> &'static str {
        "linf"
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }
}

/// Cosine distance: 1 - cos(a, b), with zero vectors treated as maximally
/// distant.
struct Cosine;

impl Space for Cosine {
    fn name(&self) -> &'static str {
        "cosinesimil"
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }
}

/// Negated dot product (maximum inner product search as a distance).
struct NegDotProd;

impl Space for NegDotProd {
    fn name(&self) -> &'static str {
        "negdotprod"
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
    }
}

/// Create a space from its factory tag.
///
/// None of the built-in spaces take parameters, so any space parameter is a
/// configuration error naming the key.
pub fn create_space(space_type: &str, params: &Params) -> Result<Arc<dyn Space>> {
    let space: Arc<dyn Space> = match space_type {
        "l2" => Arc::new(L2),
        "l1" => Arc::new(L1),
        "linf" => Arc::new(LInf),
        "cosinesimil" => Arc::new(Cosine),
        "negdotprod" => Arc::new(NegDotProd),
        other => {
            return Err(Error::Configuration(format!(
                "unknown space type {other:?}: supported spaces are \
                 l2, l1, linf, cosinesimil, negdotprod"
            )));
        }
    };
    params.expect_known(space.name(), &[])?;
    Ok(space)
}
