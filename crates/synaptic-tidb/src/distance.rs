use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use synaptic_core::SynapticError;

/// Vector distance functions supported by TiDB vector search.
///
/// Every method ranks ascending: a smaller value means a closer match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMethod {
    /// Euclidean distance.
    #[serde(rename = "VEC_L2_DISTANCE", alias = "l2")]
    L2,
    #[default]
    #[serde(rename = "VEC_COSINE_DISTANCE", alias = "cosine")]
    Cosine,
    /// Negated inner product, so that larger products sort first.
    #[serde(
        rename = "VEC_NEGATIVE_INNER_PRODUCT",
        alias = "negative_inner_product"
    )]
    NegativeInnerProduct,
    /// Manhattan distance.
    #[serde(rename = "VEC_L1_DISTANCE", alias = "l1")]
    L1,
}

impl DistanceMethod {
    pub const ALL: [DistanceMethod; 4] = [
        DistanceMethod::L2,
        DistanceMethod::Cosine,
        DistanceMethod::NegativeInnerProduct,
        DistanceMethod::L1,
    ];

    /// SQL function name used in the ranking expression.
    pub fn function_name(self) -> &'static str {
        match self {
            DistanceMethod::L2 => "VEC_L2_DISTANCE",
            DistanceMethod::Cosine => "VEC_COSINE_DISTANCE",
            DistanceMethod::NegativeInnerProduct => "VEC_NEGATIVE_INNER_PRODUCT",
            DistanceMethod::L1 => "VEC_L1_DISTANCE",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            DistanceMethod::L2 => "l2",
            DistanceMethod::Cosine => "cosine",
            DistanceMethod::NegativeInnerProduct => "negative_inner_product",
            DistanceMethod::L1 => "l1",
        }
    }
}

impl fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

impl FromStr for DistanceMethod {
    type Err = SynapticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DistanceMethod::ALL
            .into_iter()
            .find(|m| m.function_name().eq_ignore_ascii_case(s) || m.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| SynapticError::Validation(format!("unknown distance method '{s}'")))
    }
}
