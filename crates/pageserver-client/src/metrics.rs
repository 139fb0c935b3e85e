//! Minimal parser for the Prometheus text exposition the pageserver serves
//! at `/metrics`. Only what the harness queries: named samples with labels.

use std::collections::BTreeMap;

/// One parsed metric sample line.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Metric name.
    pub name: String,
    /// Label set, possibly empty.
    pub labels: BTreeMap<String, String>,
    /// Sample value.
    pub value: f64,
}

/// Parses an exposition body into samples. Comment lines, blank lines, and
/// lines that do not parse as `name[{labels}] value` are skipped.
#[must_use]
pub fn parse_metrics(text: &str) -> Vec<MetricSample> {
    text.lines().filter_map(parse_line).collect()
}

/// Returns the samples matching `name` whose label set contains every entry
/// of `label_filter`.
#[must_use]
pub fn query_all<'a>(
    samples: &'a [MetricSample],
    name: &str,
    label_filter: &BTreeMap<String, String>,
) -> Vec<&'a MetricSample> {
    samples
        .iter()
        .filter(|s| s.name == name)
        .filter(|s| {
            label_filter
                .iter()
                .all(|(k, v)| s.labels.get(k) == Some(v))
        })
        .collect()
}

fn parse_line(line: &str) -> Option<MetricSample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (name_part, value_part) = match line.find('{') {
        Some(open) => {
            let close = line.rfind('}')?;
            let labels = parse_labels(&line[open + 1..close])?;
            let value = line[close + 1..].trim();
            return Some(MetricSample {
                name: line[..open].to_string(),
                labels,
                value: value.split_whitespace().next()?.parse().ok()?,
            });
        }
        None => line.split_once(char::is_whitespace)?,
    };
    Some(MetricSample {
        name: name_part.to_string(),
        labels: BTreeMap::new(),
        value: value_part.trim().split_whitespace().next()?.parse().ok()?,
    })
}

fn parse_labels(body: &str) -> Option<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for pair in body.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=')?;
        let value = value.trim().strip_prefix('"')?.strip_suffix('"')?;
        labels.insert(key.trim().to_string(), value.to_string());
    }
    Some(labels)
}
