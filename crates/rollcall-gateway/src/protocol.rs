//! Wire envelopes: `{ "event": <string>, "data"?: <object> }` in both
//! directions, decoded once into closed enums.

use rollcall_core::{AttendanceStatus, RollcallError, RollcallResult, StudentId, Summary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Reported by `request-self-status` when the student has no mark yet.
pub const NOT_YET_UPDATED: &str = "not yet updated";

/// Message text of the `finalize-result` broadcast.
pub const FINALIZED_MESSAGE: &str = "Attendance finalized";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Body of `mark-attendance`, inbound and as broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    /// Student being marked. Not checked against the roster here.
    pub student_id: StudentId,
    /// New status, replacing any earlier mark.
    pub status: AttendanceStatus,
}

/// Events a connected peer may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Teacher records a student's status.
    MarkAttendance(MarkAttendance),
    /// Teacher asks for current counts.
    RequestSummary,
    /// Student asks for their own mark.
    RequestSelfStatus,
    /// Teacher closes the session.
    Finalize,
}

impl InboundEvent {
    /// Decode one text frame.
    ///
    /// Structural problems (not JSON, no `event`, bad `data`) are
    /// [`RollcallError::MalformedMessage`]; a well-formed envelope naming an
    /// event outside the protocol is [`RollcallError::UnknownEvent`].
    pub fn decode(text: &str) -> RollcallResult<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| RollcallError::MalformedMessage(e.to_string()))?;

        match raw.event.as_str() {
            "mark-attendance" => Ok(InboundEvent::MarkAttendance(data_of(
                &raw.event, raw.data,
            )?)),
            "request-summary" => Ok(InboundEvent::RequestSummary),
            "request-self-status" => Ok(InboundEvent::RequestSelfStatus),
            "finalize" => Ok(InboundEvent::Finalize),
            other => Err(RollcallError::UnknownEvent(other.to_string())),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::MarkAttendance(_) => "mark-attendance",
            InboundEvent::RequestSummary => "request-summary",
            InboundEvent::RequestSelfStatus => "request-self-status",
            InboundEvent::Finalize => "finalize",
        }
    }
}

fn data_of<T: DeserializeOwned>(event: &str, data: Option<serde_json::Value>) -> RollcallResult<T> {
    let data = data
        .ok_or_else(|| RollcallError::MalformedMessage(format!("'{event}' requires data")))?;
    serde_json::from_value(data)
        .map_err(|e| RollcallError::MalformedMessage(format!("invalid '{event}' data: {e}")))
}

/// Body of `self-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfStatus {
    /// `present`, `absent`, or [`NOT_YET_UPDATED`].
    pub status: String,
}

/// Body of `finalize-result`: a message plus the flattened counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeResult {
    /// Always [`FINALIZED_MESSAGE`].
    pub message: String,
    /// Counts over the persisted marks.
    #[serde(flatten)]
    pub summary: Summary,
}

/// Body of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub message: String,
}

/// Body of `connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    /// Id assigned to this connection.
    pub connection_id: String,
    /// Authenticated principal id.
    pub id: String,
    /// Authenticated role.
    pub role: rollcall_core::Role,
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// Handshake acknowledgement, sent only to the new peer.
    Connected(Connected),
    /// An accepted mark, broadcast.
    MarkAttendance(MarkAttendance),
    /// Current counts, broadcast.
    Summary(Summary),
    /// A student's own mark, unicast.
    SelfStatus(SelfStatus),
    /// Final counts after a successful finalize, broadcast.
    FinalizeResult(FinalizeResult),
    /// Any rejected event, unicast to its sender.
    Error(ErrorBody),
}

impl OutboundEvent {
    /// An `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error(ErrorBody {
            message: message.into(),
        })
    }

    /// A `self-status` frame; `None` renders as [`NOT_YET_UPDATED`].
    pub fn self_status(status: Option<AttendanceStatus>) -> Self {
        let status = status.map_or(NOT_YET_UPDATED, |s| s.as_str());
        OutboundEvent::SelfStatus(SelfStatus {
            status: status.to_string(),
        })
    }

    /// A `finalize-result` frame.
    pub fn finalize_result(summary: Summary) -> Self {
        OutboundEvent::FinalizeResult(FinalizeResult {
            message: FINALIZED_MESSAGE.to_string(),
            summary,
        })
    }

    /// Serialize as a text frame.
    pub fn to_json(&self) -> RollcallResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_mark_attendance() {
        let event = InboundEvent::decode(
            r#"{"event":"mark-attendance","data":{"studentId":"S1","status":"present"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::MarkAttendance(MarkAttendance {
                student_id: "S1".into(),
                status: AttendanceStatus::Present,
            })
        );
    }

    #[test]
    fn data_is_optional_for_bodyless_events() {
        assert_eq!(
            InboundEvent::decode(r#"{"event":"request-summary"}"#).unwrap(),
            InboundEvent::RequestSummary
        );
        assert_eq!(
            InboundEvent::decode(r#"{"event":"finalize","data":{}}"#).unwrap(),
            InboundEvent::Finalize
        );
    }

    #[test]
    fn structural_problems_are_malformed() {
        for text in [
            "not json",
            r#"{"data":{}}"#,
            r#"{"event":42}"#,
            r#"{"event":"mark-attendance"}"#,
            r#"{"event":"mark-attendance","data":{"studentId":"S1","status":"late"}}"#,
        ] {
            assert!(
                matches!(
                    InboundEvent::decode(text),
                    Err(RollcallError::MalformedMessage(_))
                ),
                "expected malformed for {text}"
            );
        }
    }

    #[test]
    fn unknown_event_is_distinct_from_malformed() {
        let err = InboundEvent::decode(r#"{"event":"start-session"}"#).unwrap_err();
        assert!(matches!(err, RollcallError::UnknownEvent(name) if name == "start-session"));
    }

    #[test]
    fn outbound_wire_shapes() {
        let summary = Summary {
            present: 1,
            absent: 2,
            total: 3,
        };
        assert_eq!(
            serde_json::to_value(OutboundEvent::Summary(summary)).unwrap(),
            json!({"event":"summary","data":{"present":1,"absent":2,"total":3}})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::finalize_result(summary)).unwrap(),
            json!({"event":"finalize-result","data":{
                "message":"Attendance finalized","present":1,"absent":2,"total":3
            }})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::self_status(None)).unwrap(),
            json!({"event":"self-status","data":{"status":"not yet updated"}})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::error("nope")).unwrap(),
            json!({"event":"error","data":{"message":"nope"}})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::MarkAttendance(MarkAttendance {
                student_id: "S1".into(),
                status: AttendanceStatus::Absent,
            }))
            .unwrap(),
            json!({"event":"mark-attendance","data":{"studentId":"S1","status":"absent"}})
        );
    }
}
