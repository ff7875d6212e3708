//! The per-run result artifact and its validation contract.
//!
//! Every required field is deserialized without a default, so a missing or
//! renamed field fails at parse time instead of reading as zero. Parse and
//! validation failures both surface as [`SweepError::MalformedResult`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Query latency percentiles, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMs {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

/// Ingestion phase breakdown, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub total: f64,
    pub parse: f64,
    pub embed: f64,
    pub insert: f64,
}

/// avg/max/min triple of a sampled resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: Spread,
    pub memory_mb: Spread,
}

/// Retrieval quality at one top-K.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub recall: f64,
    pub precision: f64,
    pub mrr: f64,
}

/// Raw measurement bundle produced by one successful unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of chunks ingested (exact).
    pub chunk_count: u64,
    pub latency_ms: LatencyMs,
    pub throughput_qps: f64,
    pub phases_sec: PhaseTimings,
    pub resources: ResourceUsage,
    /// Retrieval quality keyed by top-K.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quality: BTreeMap<u32, QualityScores>,
}

/// Metric name for the exact chunk count.
pub const CHUNK_COUNT_METRIC: &str = "ingestion.chunk_count";

impl RunResult {
    /// Parse and validate a result artifact.
    pub fn from_json_str(content: &str) -> Result<Self, SweepError> {
        let result: Self = serde_json::from_str(content)
            .map_err(|e| SweepError::MalformedResult(e.to_string()))?;
        result.validate()?;
        Ok(result)
    }

    /// Read, parse, and validate a result artifact from disk.
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let content = std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        Self::from_json_str(&content)
    }

    /// Check value ranges and internal consistency.
    pub fn validate(&self) -> Result<(), SweepError> {
        let mut problems = Vec::new();

        for (name, value) in self.metrics() {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{name} must be finite and non-negative, got {value}"));
            }
        }

        let p = &self.phases_sec;
        for (name, value) in [
            ("total", p.total),
            ("parse", p.parse),
            ("embed", p.embed),
            ("insert", p.insert),
        ] {
            if value <= 0.0 {
                problems.push(format!("phases_sec.{name} must be populated, got {value}"));
            } else if value > p.total {
                problems.push(format!("phases_sec.{name} ({value}) exceeds total ({})", p.total));
            }
        }

        let l = &self.latency_ms;
        if !(l.p50 <= l.p95 && l.p95 <= l.p99) {
            problems.push(format!(
                "latency percentiles out of order: p50={} p95={} p99={}",
                l.p50, l.p95, l.p99
            ));
        }
        if l.min > l.max {
            problems.push(format!("latency min {} exceeds max {}", l.min, l.max));
        }

        for (name, s) in [
            ("cpu_percent", &self.resources.cpu_percent),
            ("memory_mb", &self.resources.memory_mb),
        ] {
            if !(s.min <= s.avg && s.avg <= s.max) {
                problems.push(format!(
                    "resources.{name} requires min <= avg <= max, got {}/{}/{}",
                    s.min, s.avg, s.max
                ));
            }
        }

        for (k, q) in &self.quality {
            if *k == 0 {
                problems.push("quality top-K must be positive".to_string());
            }
            for (name, v) in [("recall", q.recall), ("precision", q.precision), ("mrr", q.mrr)] {
                if !(0.0..=1.0).contains(&v) {
                    problems.push(format!("quality.{k}.{name} must lie in [0, 1], got {v}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SweepError::MalformedResult(problems.join("; ")))
        }
    }

    /// Flatten the result into named scalar metrics.
    #[must_use]
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let mut copy = self.clone();
        let mut metrics: BTreeMap<String, f64> = copy
            .metric_slots_mut()
            .into_iter()
            .map(|(name, slot)| (name, *slot))
            .collect();
        metrics.insert(CHUNK_COUNT_METRIC.to_string(), self.chunk_count as f64);
        metrics
    }

    /// Overwrite a named metric in place. Returns `false` for unknown or
    /// read-only names (the chunk count is exact and never replaced).
    ///
    /// A `quality.top<k>.*` name for a top-K this result lacks adds that
    /// top-K with zeroed scores before setting the one named.
    pub fn set_metric(&mut self, name: &str, value: f64) -> bool {
        if let Some(k) = quality_top_k(name) {
            self.quality.entry(k).or_insert(QualityScores {
                recall: 0.0,
                precision: 0.0,
                mrr: 0.0,
            });
        }
        match self
            .metric_slots_mut()
            .into_iter()
            .find(|(slot_name, _)| slot_name == name)
        {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn metric_slots_mut(&mut self) -> Vec<(String, &mut f64)> {
        let mut slots: Vec<(String, &mut f64)> = Vec::with_capacity(24);
        let l = &mut self.latency_ms;
        slots.push(("latency.p50_ms".into(), &mut l.p50));
        slots.push(("latency.p95_ms".into(), &mut l.p95));
        slots.push(("latency.p99_ms".into(), &mut l.p99));
        slots.push(("latency.min_ms".into(), &mut l.min));
        slots.push(("latency.max_ms".into(), &mut l.max));
        slots.push(("throughput.qps".into(), &mut self.throughput_qps));
        let p = &mut self.phases_sec;
        slots.push(("phase.total_s".into(), &mut p.total));
        slots.push(("phase.parse_s".into(), &mut p.parse));
        slots.push(("phase.embed_s".into(), &mut p.embed));
        slots.push(("phase.insert_s".into(), &mut p.insert));
        let cpu = &mut self.resources.cpu_percent;
        slots.push(("resources.cpu_avg_pct".into(), &mut cpu.avg));
        slots.push(("resources.cpu_max_pct".into(), &mut cpu.max));
        slots.push(("resources.cpu_min_pct".into(), &mut cpu.min));
        let mem = &mut self.resources.memory_mb;
        slots.push(("resources.mem_avg_mb".into(), &mut mem.avg));
        slots.push(("resources.mem_max_mb".into(), &mut mem.max));
        slots.push(("resources.mem_min_mb".into(), &mut mem.min));
        for (k, q) in &mut self.quality {
            slots.push((format!("quality.top{k}.recall"), &mut q.recall));
            slots.push((format!("quality.top{k}.precision"), &mut q.precision));
            slots.push((format!("quality.top{k}.mrr"), &mut q.mrr));
        }
        slots
    }
}

/// The top-K of a `quality.top<k>.<score>` metric name.
fn quality_top_k(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("quality.top")?;
    let (k, score) = rest.split_once('.')?;
    if !matches!(score, "recall" | "precision" | "mrr") {
        return None;
    }
    k.parse().ok().filter(|&k| k > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "chunk_count": 5562,
        "latency_ms": {"p50": 1.2, "p95": 2.0, "p99": 2.5, "min": 0.8, "max": 3.1},
        "throughput_qps": 812.4,
        "phases_sec": {"total": 62.3, "parse": 4.1, "embed": 50.2, "insert": 8.0},
        "resources": {
            "cpu_percent": {"avg": 71.0, "max": 99.0, "min": 12.0},
            "memory_mb": {"avg": 2048.0, "max": 2300.0, "min": 1900.0}
        },
        "quality": {"3": {"recall": 0.9, "precision": 0.6, "mrr": 0.8}}
    }"#;

    fn malformed_reason(json: &str) -> String {
        match RunResult::from_json_str(json) {
            Err(SweepError::MalformedResult(reason)) => reason,
            other => panic!("expected MalformedResult, got {other:?}"),
        }
    }

    #[test]
    fn parses_valid_artifact() {
        let result = RunResult::from_json_str(VALID).unwrap();
        assert_eq!(result.chunk_count, 5562);
        assert_eq!(result.quality[&3].recall, 0.9);
    }

    #[test]
    fn quality_is_optional() {
        let mut value: serde_json::Value = serde_json::from_str(VALID).unwrap();
        value.as_object_mut().unwrap().remove("quality");
        let result = RunResult::from_json_str(&value.to_string()).unwrap();
        assert!(result.quality.is_empty());
    }

    #[test]
    fn renamed_phase_field_is_malformed_not_zero() {
        let json = VALID.replace("\"embed\"", "\"embedding_time\"");
        let reason = malformed_reason(&json);
        assert!(reason.contains("embed"), "{reason}");
    }

    #[test]
    fn zero_phase_is_malformed() {
        let json = VALID.replace("\"parse\": 4.1", "\"parse\": 0.0");
        assert!(malformed_reason(&json).contains("phases_sec.parse"));
    }

    #[test]
    fn phase_larger_than_total_is_malformed() {
        let json = VALID.replace("\"embed\": 50.2", "\"embed\": 70.0");
        assert!(malformed_reason(&json).contains("exceeds total"));
    }

    #[test]
    fn wrong_type_is_malformed() {
        let json = VALID.replace("\"throughput_qps\": 812.4", "\"throughput_qps\": \"fast\"");
        malformed_reason(&json);
    }

    #[test]
    fn unordered_percentiles_are_malformed() {
        let json = VALID.replace("\"p95\": 2.0", "\"p95\": 9.0");
        assert!(malformed_reason(&json).contains("percentiles"));
    }

    #[test]
    fn out_of_range_quality_is_malformed() {
        let json = VALID.replace("\"recall\": 0.9", "\"recall\": 1.5");
        assert!(malformed_reason(&json).contains("recall"));
    }

    #[test]
    fn metrics_are_flattened() {
        let result = RunResult::from_json_str(VALID).unwrap();
        let metrics = result.metrics();
        assert_eq!(metrics["phase.total_s"], 62.3);
        assert_eq!(metrics["quality.top3.mrr"], 0.8);
        assert_eq!(metrics[CHUNK_COUNT_METRIC], 5562.0);
        assert_eq!(metrics.len(), 16 + 3 + 1);
    }

    #[test]
    fn set_metric_updates_nested_field() {
        let mut result = RunResult::from_json_str(VALID).unwrap();
        assert!(result.set_metric("phase.embed_s", 49.0));
        assert_eq!(result.phases_sec.embed, 49.0);
        assert!(!result.set_metric(CHUNK_COUNT_METRIC, 1.0));
        assert!(!result.set_metric("nope", 1.0));
    }

    #[test]
    fn set_metric_adds_missing_top_k() {
        let mut result = RunResult::from_json_str(VALID).unwrap();
        assert!(result.set_metric("quality.top10.recall", 0.95));
        assert_eq!(result.quality[&10].recall, 0.95);
        assert!(result.set_metric("quality.top10.mrr", 0.7));
        assert_eq!(result.quality[&10].mrr, 0.7);

        assert!(!result.set_metric("quality.top0.recall", 1.0));
        assert!(!result.set_metric("quality.top5.ndcg", 1.0));
        assert!(!result.quality.contains_key(&0));
        assert!(!result.quality.contains_key(&5));
    }
}
