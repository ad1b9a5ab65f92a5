use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::Error, Deserialize, Deserializer};

/// 空字符串视为未填写
pub fn deser_empty_to_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(de)?;
    Ok(value.and_then(|v| op::ternary!(v.trim().is_empty() => None; Some(v))))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// 接受 `YYYY-MM-DD` 或 RFC 3339 时间
pub fn deserialize_datetime<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(de)?;
    parse_datetime(&value).ok_or_else(|| D::Error::custom(format!("invalid date `{value}`")))
}

pub fn deserialize_opt_datetime<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(de)?;
    match value {
        Some(v) if !v.trim().is_empty() => parse_datetime(&v)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date `{v}`"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Form {
        #[serde(default, deserialize_with = "deser_empty_to_none")]
        company: Option<String>,
        #[serde(deserialize_with = "deserialize_datetime")]
        due: DateTime<Utc>,
        #[serde(default, deserialize_with = "deserialize_opt_datetime")]
        close: Option<DateTime<Utc>>,
    }

    #[test]
    fn dates_and_blanks() {
        let form: Form =
            serde_json::from_value(json!({"company": " ", "due": "2026-03-01", "close": ""}))
                .unwrap();
        assert_eq!(form.company, None);
        assert_eq!(form.due.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(form.close, None);

        let form: Form = serde_json::from_value(
            json!({"company": "Acme", "due": "2026-03-01T10:30:00Z", "close": "2026-04-01"}),
        )
        .unwrap();
        assert_eq!(form.company.as_deref(), Some("Acme"));
        assert_eq!(form.due.to_rfc3339(), "2026-03-01T10:30:00+00:00");
        assert!(form.close.is_some());
    }

    #[test]
    fn bad_dates_fail() {
        assert!(serde_json::from_value::<Form>(json!({"due": "tomorrow"})).is_err());
    }
}
