//! Target systems under benchmark.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// The fixed set of storage engines a sweep can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSystem {
    Faiss,
    Chroma,
    Qdrant,
    Weaviate,
    Milvus,
    OpenSearch,
    PgVector,
}

impl TargetSystem {
    /// All systems, in declaration order.
    pub const ALL: [TargetSystem; 7] = [
        Self::Faiss,
        Self::Chroma,
        Self::Qdrant,
        Self::Weaviate,
        Self::Milvus,
        Self::OpenSearch,
        Self::PgVector,
    ];

    /// Lowercase identifier used in paths, commands, and artifacts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faiss => "faiss",
            Self::Chroma => "chroma",
            Self::Qdrant => "qdrant",
            Self::Weaviate => "weaviate",
            Self::Milvus => "milvus",
            Self::OpenSearch => "opensearch",
            Self::PgVector => "pgvector",
        }
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetSystem {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|sys| sys.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                SweepError::InvalidArgument(format!(
                    "unknown system '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Chroma".parse::<TargetSystem>().unwrap(), TargetSystem::Chroma);
        assert_eq!("PGVECTOR".parse::<TargetSystem>().unwrap(), TargetSystem::PgVector);
    }

    #[test]
    fn unknown_system_is_invalid_argument() {
        let err = "sqlite".parse::<TargetSystem>().unwrap_err();
        assert!(matches!(err, SweepError::InvalidArgument(_)));
        assert!(err.to_string().contains("faiss"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for sys in TargetSystem::ALL {
            assert_eq!(sys.to_string().parse::<TargetSystem>().unwrap(), sys);
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&TargetSystem::OpenSearch).unwrap();
        assert_eq!(json, "\"opensearch\"");
    }
}
