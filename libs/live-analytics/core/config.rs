use crate::error::{LiveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;
use url::Url;

pub const MIN_SPEAKERS_RANGE: RangeInclusive<u8> = 1..=10;
pub const MAX_SPEAKERS_RANGE: RangeInclusive<u8> = 1..=20;
pub const SILENCE_THRESHOLD_RANGE: RangeInclusive<f64> = 0.1..=5.0;
pub const METRICS_INTERVAL_RANGE: RangeInclusive<f64> = 1.0..=60.0;

/// Analysis options for one live session
///
/// Every option is optional; unset options are left to the server's
/// defaults and are omitted from both the connection URL and `Configure`
/// frames. The same type doubles as a partial update for
/// [`LiveSession::configure`](crate::core::session::LiveSession::configure).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_speakers: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speakers: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interruptions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_phrases: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_detection: Option<bool>,
    /// Seconds of silence before a silence event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_metrics: Option<bool>,
    /// Seconds between metrics updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_metrics_interval: Option<f64>,
}

impl SessionConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speakers(mut self, min: u8, max: u8) -> Self {
        self.speaker_detection = Some(true);
        self.min_speakers = Some(min);
        self.max_speakers = Some(max);
        self
    }

    pub fn with_silence_threshold(mut self, seconds: f64) -> Self {
        self.silence_detection = Some(true);
        self.silence_threshold = Some(seconds);
        self
    }

    pub fn with_metrics_interval(mut self, seconds: f64) -> Self {
        self.realtime_metrics = Some(true);
        self.realtime_metrics_interval = Some(seconds);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_audio(mut self, encoding: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        self.encoding = Some(encoding.into());
        self.sample_rate = Some(sample_rate);
        self.channels = Some(channels);
        self
    }

    /// Check the numeric invariants
    ///
    /// # Returns
    /// * `Ok(())` - Configuration may be sent to the server
    /// * `Err(LiveError::Configuration)` - First violated invariant
    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_speakers {
            if !MIN_SPEAKERS_RANGE.contains(&min) {
                return Err(LiveError::configuration(format!(
                    "min_speakers must be between {} and {}, got {}",
                    MIN_SPEAKERS_RANGE.start(),
                    MIN_SPEAKERS_RANGE.end(),
                    min
                )));
            }
        }

        if let Some(max) = self.max_speakers {
            if !MAX_SPEAKERS_RANGE.contains(&max) {
                return Err(LiveError::configuration(format!(
                    "max_speakers must be between {} and {}, got {}",
                    MAX_SPEAKERS_RANGE.start(),
                    MAX_SPEAKERS_RANGE.end(),
                    max
                )));
            }
        }

        if let (Some(min), Some(max)) = (self.min_speakers, self.max_speakers) {
            if min > max {
                return Err(LiveError::configuration(format!(
                    "min_speakers ({}) cannot exceed max_speakers ({})",
                    min, max
                )));
            }
        }

        // NaN fails `contains`, which is what we want
        if let Some(threshold) = self.silence_threshold {
            if !SILENCE_THRESHOLD_RANGE.contains(&threshold) {
                return Err(LiveError::configuration(format!(
                    "silence_threshold must be between {} and {} seconds, got {}",
                    SILENCE_THRESHOLD_RANGE.start(),
                    SILENCE_THRESHOLD_RANGE.end(),
                    threshold
                )));
            }
        }

        if let Some(interval) = self.realtime_metrics_interval {
            if !METRICS_INTERVAL_RANGE.contains(&interval) {
                return Err(LiveError::configuration(format!(
                    "realtime_metrics_interval must be between {} and {} seconds, got {}",
                    METRICS_INTERVAL_RANGE.start(),
                    METRICS_INTERVAL_RANGE.end(),
                    interval
                )));
            }
        }

        Ok(())
    }

    /// Overlay every option set in `partial` onto `self`
    pub fn merge(&mut self, partial: &SessionConfiguration) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &partial.$field {
                        self.$field = Some(value.clone());
                    }
                )*
            };
        }

        overlay!(
            language,
            encoding,
            sample_rate,
            channels,
            speaker_detection,
            min_speakers,
            max_speakers,
            action_items,
            questions,
            interruptions,
            sentiment,
            key_phrases,
            silence_detection,
            silence_threshold,
            realtime_metrics,
            realtime_metrics_interval,
        );
    }

    /// Copy of `self` with `partial` merged in, if the result is valid
    pub fn merged(&self, partial: &SessionConfiguration) -> Result<SessionConfiguration> {
        let mut next = self.clone();
        next.merge(partial);
        next.validate()?;
        Ok(next)
    }

    /// True when no option is set
    pub fn is_empty(&self) -> bool {
        *self == SessionConfiguration::default()
    }

    /// Options as `(name, value)` pairs in declaration order
    pub fn to_query_pairs(&self) -> Result<Vec<(String, String)>> {
        let value = serde_json::to_value(self)?;
        let pairs = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, rendered)
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(pairs)
    }

    /// Connection URL: `base` with every set option appended as a query parameter
    pub fn connection_url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| LiveError::configuration(format!("invalid url '{}': {}", base, e)))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(LiveError::configuration(format!(
                    "url scheme must be ws or wss, got '{}'",
                    other
                )))
            }
        }

        let pairs = self.to_query_pairs()?;
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// What `finalize` does to the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeMode {
    /// Send `Finalize` and move to `Closing`
    #[default]
    Close,
    /// Send `Finalize` and stay `Open`; the server decides what happens next
    SignalOnly,
}

/// Client configuration
///
/// Everything a session needs besides the analysis options.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Streaming endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Extra HTTP headers for the upgrade request
    pub headers: HashMap<String, String>,
    /// Send `KeepAlive` at this interval while open
    pub keep_alive_interval: Option<Duration>,
    pub finalize_mode: FinalizeMode,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            keep_alive_interval: None,
            finalize_mode: FinalizeMode::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_configuration_is_valid() {
        assert!(SessionConfiguration::new().validate().is_ok());
    }

    #[test]
    fn test_speaker_bounds() {
        assert!(SessionConfiguration::new().with_speakers(2, 6).validate().is_ok());
        assert!(SessionConfiguration::new().with_speakers(10, 20).validate().is_ok());

        let inverted = SessionConfiguration::new().with_speakers(5, 3).validate();
        assert!(inverted.unwrap_err().is_configuration());

        let too_many = SessionConfiguration {
            max_speakers: Some(21),
            ..Default::default()
        };
        assert!(too_many.validate().is_err());

        let min_too_high = SessionConfiguration {
            min_speakers: Some(11),
            ..Default::default()
        };
        assert!(min_too_high.validate().is_err());

        let zero = SessionConfiguration {
            min_speakers: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_threshold_and_interval_bounds() {
        for ok in [0.1, 1.0, 5.0] {
            assert!(SessionConfiguration::new().with_silence_threshold(ok).validate().is_ok());
        }
        for bad in [0.0, 0.09, 5.01, f64::NAN] {
            assert!(SessionConfiguration::new().with_silence_threshold(bad).validate().is_err());
        }

        for ok in [1.0, 30.0, 60.0] {
            assert!(SessionConfiguration::new().with_metrics_interval(ok).validate().is_ok());
        }
        for bad in [0.5, 60.5] {
            assert!(SessionConfiguration::new().with_metrics_interval(bad).validate().is_err());
        }
    }

    #[test]
    fn test_merge_only_overrides_set_fields() {
        let mut base = SessionConfiguration::new()
            .with_speakers(2, 6)
            .with_language("en");
        let partial = SessionConfiguration {
            max_speakers: Some(8),
            sentiment: Some(true),
            ..Default::default()
        };

        base.merge(&partial);

        assert_eq!(base.min_speakers, Some(2));
        assert_eq!(base.max_speakers, Some(8));
        assert_eq!(base.language.as_deref(), Some("en"));
        assert_eq!(base.sentiment, Some(true));
    }

    #[test]
    fn test_merged_rejects_invalid_result() {
        let base = SessionConfiguration::new().with_speakers(4, 6);
        let partial = SessionConfiguration {
            max_speakers: Some(3),
            ..Default::default()
        };
        assert!(base.merged(&partial).is_err());
    }

    #[test]
    fn test_connection_url_appends_options() {
        let config = SessionConfiguration::new()
            .with_language("en-US")
            .with_speakers(2, 4);
        let url = config.connection_url("wss://api.example.com/v1/live").unwrap();

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("language".to_string(), "en-US".to_string())));
        assert!(query.contains(&("speaker_detection".to_string(), "true".to_string())));
        assert!(query.contains(&("min_speakers".to_string(), "2".to_string())));
        assert!(query.contains(&("max_speakers".to_string(), "4".to_string())));
    }

    #[test]
    fn test_connection_url_without_options_has_no_query() {
        let url = SessionConfiguration::new()
            .connection_url("ws://localhost:9000/live")
            .unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_connection_url_rejects_http() {
        let err = SessionConfiguration::new()
            .connection_url("https://api.example.com")
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
