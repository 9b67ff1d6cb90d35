use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field values discovered while scanning an alert. Anything the scanner
/// recognizes lands in one of these three shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Map(IndexMap<String, String>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Map(map) => {
                let joined = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{joined}")
            }
        }
    }
}

/// The upstream feed a product came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Alerts,
    ShortTermForecast,
    MonthOutlook,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Alerts => write!(f, "alerts"),
            FeedKind::ShortTermForecast => write!(f, "short_term_forecast"),
            FeedKind::MonthOutlook => write!(f, "month_outlook"),
        }
    }
}

/// One item as delivered by a feed, before parsing. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub product_id: String,
    /// Wire timestamp exactly as the feed wrote it.
    pub issued_at: String,
    pub body: String,
    pub feed_kind: FeedKind,
}

/// A parsed alert bulletin, identified by `(message_code, serial_number)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub message_code: String,
    pub serial_number: i64,
    pub product_id: String,
    pub issued_at: DateTime<Utc>,
    /// Original bulletin text.
    pub message: String,
    pub fields: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unhandled_lines: Vec<String>,
}

impl AlertRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::Alert {
            message_code: self.message_code.clone(),
            serial_number: self.serial_number,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_str)
    }

    pub fn supersedes(&self) -> bool {
        self.fields.contains_key("supersedes")
    }
}

/// Storm probabilities (percent) for one forecast day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StormProbabilities {
    pub active: i64,
    pub minor: i64,
    pub moderate: i64,
    pub extreme: i64,
}

/// The 3-day geomagnetic forecast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRecord {
    pub product: String,
    pub issued_at: DateTime<Utc>,
    pub storm_probabilities: BTreeMap<NaiveDate, StormProbabilities>,
    /// Day → three-hour window (`00-03UT`) → Kp.
    pub kp_index: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
    /// Kept as text: legacy reports carry placeholders instead of numbers.
    pub ap_index: BTreeMap<NaiveDate, String>,
    /// `observed` / `estimated` / `predicted` rows, minus their `Ap` token.
    pub ap_summary: BTreeMap<String, String>,
    pub raw: String,
}

impl ForecastRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::Forecast {
            product: self.product.clone(),
            issued_at: self.issued_at,
        }
    }
}

/// The 27-day outlook table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlookRecord {
    pub product: String,
    pub issued_at: DateTime<Utc>,
    pub radio_flux: BTreeMap<NaiveDate, i64>,
    pub ap_index: BTreeMap<NaiveDate, i64>,
    pub kp_index: BTreeMap<NaiveDate, i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unhandled_lines: Vec<String>,
    pub raw: String,
}

impl OutlookRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::Outlook {
            product: self.product.clone(),
            issued_at: self.issued_at,
        }
    }
}

/// Idempotency key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Alert {
        message_code: String,
        serial_number: i64,
    },
    Forecast {
        product: String,
        issued_at: DateTime<Utc>,
    },
    Outlook {
        product: String,
        issued_at: DateTime<Utc>,
    },
}

impl RecordKey {
    /// Leading word of every storage key in a family, without its `-`.
    pub fn storage_prefix(kind: FeedKind) -> &'static str {
        match kind {
            FeedKind::Alerts => "alert",
            FeedKind::ShortTermForecast => "forecast",
            FeedKind::MonthOutlook => "outlook",
        }
    }

    pub fn feed_kind(&self) -> FeedKind {
        match self {
            RecordKey::Alert { .. } => FeedKind::Alerts,
            RecordKey::Forecast { .. } => FeedKind::ShortTermForecast,
            RecordKey::Outlook { .. } => FeedKind::MonthOutlook,
        }
    }

    /// Key rendered with only `[A-Za-z0-9_.~-]`, usable as a file name.
    /// Distinct keys always render differently.
    pub fn storage_key(&self) -> String {
        let prefix = Self::storage_prefix(self.feed_kind());
        match self {
            RecordKey::Alert {
                message_code,
                serial_number,
            } => format!("{prefix}-{}-{}", slug(message_code), serial_number),
            RecordKey::Forecast { product, issued_at } | RecordKey::Outlook { product, issued_at } => {
                format!("{prefix}-{}-{}", slug(product), issued_at.format("%Y%m%dT%H%MZ"))
            }
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Alert {
                message_code,
                serial_number,
            } => write!(f, "{message_code}/{serial_number}"),
            RecordKey::Forecast { product, issued_at } | RecordKey::Outlook { product, issued_at } => {
                write!(f, "{product} @ {}", issued_at.to_rfc3339())
            }
        }
    }
}

/// Injective file-safe rendering: ASCII alphanumerics and `.` pass
/// through, a space becomes `_`, and every other byte is written as `~XX`.
/// The output never contains `-`, so it cannot run into the key separators.
fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '.' => out.push(c),
            ' ' => out.push('_'),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("~{byte:02X}"));
                }
            }
        }
    }
    out
}

/// What a store persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredRecord {
    Alert(AlertRecord),
    Forecast(ForecastRecord),
    Outlook(OutlookRecord),
}

impl StoredRecord {
    pub fn key(&self) -> RecordKey {
        match self {
            StoredRecord::Alert(r) => r.key(),
            StoredRecord::Forecast(r) => r.key(),
            StoredRecord::Outlook(r) => r.key(),
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        match self {
            StoredRecord::Alert(r) => r.issued_at,
            StoredRecord::Forecast(r) => r.issued_at,
            StoredRecord::Outlook(r) => r.issued_at,
        }
    }

    pub fn feed_kind(&self) -> FeedKind {
        match self {
            StoredRecord::Alert(_) => FeedKind::Alerts,
            StoredRecord::Forecast(_) => FeedKind::ShortTermForecast,
            StoredRecord::Outlook(_) => FeedKind::MonthOutlook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn storage_keys_are_file_safe() {
        let key = RecordKey::Outlook {
            product: "27-day Space Weather Outlook Table 27DO.txt".to_string(),
            issued_at: Utc.with_ymd_and_hms(2023, 5, 1, 3, 39, 0).unwrap(),
        };
        assert_eq!(
            key.storage_key(),
            "outlook-27~2Dday_Space_Weather_Outlook_Table_27DO.txt-20230501T0339Z"
        );

        let alert = RecordKey::Alert {
            message_code: "WATA20".to_string(),
            serial_number: 1034,
        };
        assert_eq!(alert.storage_key(), "alert-WATA20-1034");
        assert_eq!(alert.to_string(), "WATA20/1034");
    }

    #[test]
    fn storage_keys_never_collide() {
        let alert = |code: &str, serial: i64| {
            RecordKey::Alert {
                message_code: code.to_string(),
                serial_number: serial,
            }
            .storage_key()
        };
        let keys = [
            alert("A/B", 1),
            alert("A_B", 1),
            alert("A B", 1),
            alert("A~2FB", 1),
            alert("X-", 1),
            alert("X", -1),
            alert("Ä", 1),
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "{keys:?}");
        assert_eq!(keys[0], "alert-A~2FB-1");
        assert_eq!(keys[2], "alert-A_B-1");
        assert_eq!(keys[6], "alert-~C3~84-1");
    }

    #[test]
    fn field_values_serialize_untagged() {
        let mut days = IndexMap::new();
        days.insert("Apr 24".to_string(), "G3 (Strong)".to_string());
        let values = vec![
            FieldValue::Integer(55),
            FieldValue::Text("WATA20".to_string()),
            FieldValue::Map(days),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[55,"WATA20",{"Apr 24":"G3 (Strong)"}]"#);
        let back: Vec<FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn stored_record_is_tagged_by_kind() {
        let record = StoredRecord::Outlook(OutlookRecord {
            product: "27DO".to_string(),
            issued_at: Utc.with_ymd_and_hms(2023, 5, 1, 3, 39, 0).unwrap(),
            radio_flux: BTreeMap::from([(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(), 150)]),
            ap_index: BTreeMap::new(),
            kp_index: BTreeMap::new(),
            unhandled_lines: Vec::new(),
            raw: String::new(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "outlook");
        assert_eq!(json["radio_flux"]["2023-05-01"], 150);
    }
}
