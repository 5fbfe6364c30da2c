//! Label codec
//!
//! Labels on the pull request are the bot's only persistent state: control
//! markers, the in-progress marker, per-PR merge method overrides and the
//! retry counter all live there. This module maps label names to typed values
//! and back, using the configured markers.

use crate::types::MergeMethod;
use serde::{Deserialize, Serialize};

/// Label names and prefixes controlling the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Lowers the review threshold to `min_light_review`
    pub light_review: String,
    /// Requests an automated merge
    pub need_merge: String,
    /// Set while an update or merge is underway
    pub merge_in_progress: String,
    /// Prefix of the per-PR merge method override (`<prefix><method>`)
    pub merge_method_prefix: String,
    /// Prefix of the retry counter (`<prefix><n>`)
    pub merge_retry_prefix: String,
    /// Set when the bot gives up and a human has to merge
    pub need_human_merge: String,
    /// Excludes the PR from automation
    pub no_merge: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            light_review: "bot/light-review".to_string(),
            need_merge: "status/3-needs-merge".to_string(),
            merge_in_progress: "status/4-merge-in-progress".to_string(),
            merge_method_prefix: "bot/merge-method-".to_string(),
            merge_retry_prefix: "bot/merge-retry-".to_string(),
            need_human_merge: "bot/need-human-merge".to_string(),
            no_merge: "bot/no-merge".to_string(),
        }
    }
}

/// Retry counter value, encoded as `<retry prefix><attempt>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetryCount(pub u32);

impl RetryCount {
    /// Next attempt
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// A label name decoded against the markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotLabel {
    /// `need-merge` marker
    NeedMerge,
    /// `no-merge` marker
    NoMerge,
    /// `need-human-merge` marker
    NeedHumanMerge,
    /// `merge-in-progress` marker
    MergeInProgress,
    /// `light-review` marker
    LightReview,
    /// Valid merge method override
    MergeMethod(MergeMethod),
    /// Merge method prefix followed by an unknown method
    InvalidMergeMethod(String),
    /// Retry counter; an unparsable suffix decodes as attempt 0
    Retry(RetryCount),
    /// Not a bot label
    Other(String),
}

/// Encodes and decodes bot state into label names
#[derive(Debug, Clone)]
pub struct LabelCodec {
    markers: Markers,
}

impl LabelCodec {
    /// Create a codec over the given markers
    pub const fn new(markers: Markers) -> Self {
        Self { markers }
    }

    /// The markers this codec uses
    pub const fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Decode a label name
    pub fn decode(&self, label: &str) -> BotLabel {
        let m = &self.markers;
        let is = |marker: &str| !marker.is_empty() && label == marker;

        if is(&m.need_merge) {
            return BotLabel::NeedMerge;
        }
        if is(&m.no_merge) {
            return BotLabel::NoMerge;
        }
        if is(&m.need_human_merge) {
            return BotLabel::NeedHumanMerge;
        }
        if is(&m.merge_in_progress) {
            return BotLabel::MergeInProgress;
        }
        if is(&m.light_review) {
            return BotLabel::LightReview;
        }

        if let Some(raw) = strip_marker(label, &m.merge_method_prefix) {
            return raw.parse().map_or_else(
                |_| BotLabel::InvalidMergeMethod(raw.to_string()),
                BotLabel::MergeMethod,
            );
        }

        if let Some(raw) = strip_marker(label, &m.merge_retry_prefix) {
            let attempt = raw.parse().unwrap_or_else(|e| {
                tracing::warn!(label, error = %e, "unreadable retry label, counting as 0");
                0
            });
            return BotLabel::Retry(RetryCount(attempt));
        }

        BotLabel::Other(label.to_string())
    }

    /// Encode a bot label into its name
    pub fn encode(&self, label: &BotLabel) -> String {
        let m = &self.markers;
        match label {
            BotLabel::NeedMerge => m.need_merge.clone(),
            BotLabel::NoMerge => m.no_merge.clone(),
            BotLabel::NeedHumanMerge => m.need_human_merge.clone(),
            BotLabel::MergeInProgress => m.merge_in_progress.clone(),
            BotLabel::LightReview => m.light_review.clone(),
            BotLabel::MergeMethod(method) => format!("{}{method}", m.merge_method_prefix),
            BotLabel::InvalidMergeMethod(raw) => format!("{}{raw}", m.merge_method_prefix),
            BotLabel::Retry(count) => format!("{}{}", m.merge_retry_prefix, count.0),
            BotLabel::Other(name) => name.clone(),
        }
    }

    /// Label name for a retry attempt
    pub fn retry(&self, count: RetryCount) -> String {
        self.encode(&BotLabel::Retry(count))
    }

    /// Label name for a merge method override
    pub fn merge_method(&self, method: MergeMethod) -> String {
        self.encode(&BotLabel::MergeMethod(method))
    }

    /// First retry label on the PR, with its decoded count
    pub fn find_retry<'a>(&self, labels: &'a [String]) -> Option<(&'a str, RetryCount)> {
        labels.iter().find_map(|l| match self.decode(l) {
            BotLabel::Retry(count) => Some((l.as_str(), count)),
            _ => None,
        })
    }

    /// Merge method override carried by the labels, if any
    ///
    /// `Some(Err(raw))` means the prefix is present with an unknown method.
    pub fn find_merge_method(&self, labels: &[String]) -> Option<Result<MergeMethod, String>> {
        labels.iter().find_map(|l| match self.decode(l) {
            BotLabel::MergeMethod(method) => Some(Ok(method)),
            BotLabel::InvalidMergeMethod(raw) => Some(Err(raw)),
            _ => None,
        })
    }

    /// Labels removed once a PR is merged
    pub fn cleanup_labels(&self) -> Vec<String> {
        let m = &self.markers;
        let mut labels = vec![
            m.merge_in_progress.clone(),
            m.need_merge.clone(),
            m.light_review.clone(),
        ];
        labels.extend(MergeMethod::ALL.iter().map(|method| self.merge_method(*method)));
        labels.retain(|l| !l.is_empty());
        labels
    }
}

fn strip_marker<'a>(label: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    label.strip_prefix(prefix)
}
