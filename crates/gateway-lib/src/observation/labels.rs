//! Label string parsing
//!
//! Label strings are comma-separated `key=value` segments such as
//! `class=gold,pod=p1,source=src1`. Only `class`, `pod` and `source` are
//! recognized; other keys are ignored.

/// Attribution of a metric sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pub class: Option<String>,
    pub pod: Option<String>,
    pub source: Option<String>,
}

impl LabelSet {
    /// Coordinates with `sentinel` substituted for each missing component
    pub fn coordinates<'a>(&'a self, sentinel: &'a str) -> (&'a str, &'a str, &'a str) {
        (
            self.class.as_deref().unwrap_or(sentinel),
            self.pod.as_deref().unwrap_or(sentinel),
            self.source.as_deref().unwrap_or(sentinel),
        )
    }
}

/// Parse a label string into (class, pod, source)
///
/// Segments without `=` are skipped, later duplicates win and segment order
/// does not matter. Never fails.
pub fn parse_labels(input: &str) -> LabelSet {
    let mut labels = LabelSet::default();
    for (key, value) in segments(input) {
        match key {
            "class" => labels.class = Some(value.to_string()),
            "pod" => labels.pod = Some(value.to_string()),
            "source" => labels.source = Some(value.to_string()),
            _ => {}
        }
    }
    labels
}

/// Extract only the `class` key
pub fn parse_class(input: &str) -> Option<String> {
    segments(input)
        .filter(|(key, _)| *key == "class")
        .last()
        .map(|(_, value)| value.to_string())
}

fn segments(input: &str) -> impl Iterator<Item = (&str, &str)> {
    input
        .split(',')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
}
