//! Domain events surfaced to callers

use serde::Serialize;
use serde_json::Value;

/// Discriminator carried in `data.type` of application payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A freshly issued sign-in code URL
    Code,
    /// A subscriber (student) report
    SubjectResult,
    Other(i64),
}

impl PayloadKind {
    fn from_discriminator(value: i64) -> Self {
        match value {
            1 => Self::Code,
            3 => Self::SubjectResult,
            other => Self::Other(other),
        }
    }

    /// Read the kind from an application payload, if it carries one
    pub fn of(data: &Value) -> Option<Self> {
        data.get("type").and_then(integral).map(Self::from_discriminator)
    }
}

/// New code URL pushed by the server
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CodeRefresh {
    pub url: String,
}

/// Resolved outcome of a subscriber report
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubjectResult {
    pub id: i64,
    pub name: String,
    pub external_number: String,
    pub rank: i32,
}

/// Event derived from an application-channel payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    CodeRefresh(CodeRefresh),
    SubjectResult(SubjectResult),
}

impl DomainEvent {
    /// Map an application payload to an event
    ///
    /// Unrecognized kinds, missing fields and empty URLs yield `None`.
    pub fn from_payload(data: &Value) -> Option<Self> {
        match PayloadKind::of(data)? {
            PayloadKind::Code => {
                let url = data.get("qrUrl")?.as_str()?;
                if url.is_empty() {
                    return None;
                }
                Some(Self::CodeRefresh(CodeRefresh { url: url.to_string() }))
            }
            PayloadKind::SubjectResult => {
                let student = data.get("student")?.as_object()?;
                Some(Self::SubjectResult(SubjectResult {
                    id: student.get("id").and_then(integral).unwrap_or(0),
                    name: student.get("name").map(text).unwrap_or_default(),
                    external_number: student.get("studentNumber").map(text).unwrap_or_default(),
                    rank: student
                        .get("rank")
                        .and_then(integral)
                        .and_then(|r| i32::try_from(r).ok())
                        .unwrap_or(0),
                }))
            }
            PayloadKind::Other(_) => None,
        }
    }
}

/// Integral value from a JSON number, accepting float encodings without
/// a fractional part
fn integral(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_refresh() {
        let event = DomainEvent::from_payload(&json!({"type": 1, "qrUrl": "https://x/y"}));
        assert_eq!(
            event,
            Some(DomainEvent::CodeRefresh(CodeRefresh { url: "https://x/y".into() }))
        );
    }

    #[test]
    fn test_code_refresh_empty_url() {
        assert_eq!(DomainEvent::from_payload(&json!({"type": 1, "qrUrl": ""})), None);
        assert_eq!(DomainEvent::from_payload(&json!({"type": 1})), None);
    }

    #[test]
    fn test_subject_result_float_encoded() {
        let event = DomainEvent::from_payload(&json!({
            "type": 3.0,
            "student": {"name": "A", "studentNumber": "007", "rank": 3.0, "id": 99.0}
        }));
        assert_eq!(
            event,
            Some(DomainEvent::SubjectResult(SubjectResult {
                id: 99,
                name: "A".into(),
                external_number: "007".into(),
                rank: 3,
            }))
        );
    }

    #[test]
    fn test_subject_result_large_id() {
        let event = DomainEvent::from_payload(&json!({
            "type": 3,
            "student": {"id": 4_000_000_000_i64, "rank": 1}
        }));
        match event {
            Some(DomainEvent::SubjectResult(r)) => {
                assert_eq!(r.id, 4_000_000_000);
                assert_eq!(r.name, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_no_event() {
        assert_eq!(DomainEvent::from_payload(&json!({"type": 2})), None);
        assert_eq!(DomainEvent::from_payload(&json!({"qrUrl": "https://x"})), None);
        assert_eq!(DomainEvent::from_payload(&json!("text")), None);
    }

    #[test]
    fn test_fractional_rank_rejected() {
        let event = DomainEvent::from_payload(&json!({
            "type": 3,
            "student": {"rank": 2.5, "id": 1}
        }));
        match event {
            Some(DomainEvent::SubjectResult(r)) => assert_eq!(r.rank, 0),
            other => panic!("unexpected {:?}", other),
        }
    }
}
