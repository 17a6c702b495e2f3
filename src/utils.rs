use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;

pub fn serialize_date<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Stamped {
        #[serde(serialize_with = "serialize_date")]
        at: DateTime<Utc>,
    }

    #[test]
    fn dates_serialize_as_rfc3339_with_millis() {
        let stamped = Stamped {
            at: Utc.with_ymd_and_hms(2021, 3, 5, 12, 30, 45).unwrap(),
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert_eq!(json, r#"{"at":"2021-03-05T12:30:45.000Z"}"#);
    }
}
