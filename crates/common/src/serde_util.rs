//! Serialization utilities for common data types
//!
//! Reusable serde helpers shared by the domain types. Durations are carried
//! as milliseconds on the wire for JSON compatibility.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Custom serialization module for `Duration` as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use courier_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Custom serialization module for `Vec<Duration>` as millisecond lists
///
/// Used for ordered retry-interval tables where every element is a Duration.
pub mod duration_millis_vec {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    /// Serialize a list of Durations as milliseconds (u64)
    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(durations.iter().map(|d| d.as_millis() as u64))
    }

    /// Deserialize a list of milliseconds (u64) into Durations
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization utilities
    //!
    //! Tests cover duration_millis and duration_millis_vec round trips and
    //! edge cases (zero, large values).

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        #[serde(with = "duration_millis")]
        timeout: Duration,
        #[serde(with = "duration_millis_vec")]
        intervals: Vec<Duration>,
    }

    /// Tests that Duration fields serialize to milliseconds as u64
    #[test]
    fn test_duration_millis_serialize() {
        let data = TestStruct {
            timeout: Duration::from_millis(1500),
            intervals: vec![Duration::from_secs(1), Duration::from_secs(2)],
        };

        let json = serde_json::to_string(&data).expect("Should serialize valid struct");
        assert!(json.contains("1500"), "Should contain milliseconds value");
        assert!(json.contains("[1000,2000]"), "Should contain interval list in millis");
    }

    /// Tests that millisecond values deserialize back into Durations
    #[test]
    fn test_duration_millis_round_trip() {
        let data = TestStruct {
            timeout: Duration::ZERO,
            intervals: vec![Duration::from_millis(250), Duration::from_secs(3600)],
        };

        let json = serde_json::to_string(&data).expect("Should serialize valid struct");
        let back: TestStruct = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(back, data);
    }
}
