#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for rollcall-core: error rendering and shared types.

use rollcall_core::*;

// ---------------------------------------------------------------------------
// 1. Error messages are what clients see in `error` frames
// ---------------------------------------------------------------------------

#[test]
fn session_state_errors_render_plain_messages() {
    let err: RollcallError = SessionStateError::NoActiveSession.into();
    assert!(err.is_session_state());
    assert_eq!(err.to_string(), "No active session");

    let err: RollcallError = SessionStateError::SessionAlreadyActive.into();
    assert_eq!(err.to_string(), "A session is already active");
}

#[test]
fn taxonomy_variants_carry_context() {
    let err = RollcallError::Authorization("only teachers can mark attendance".into());
    assert!(!err.is_session_state());
    assert!(err.to_string().contains("only teachers"));

    let err = RollcallError::UnknownEvent("dance".into());
    assert_eq!(err.to_string(), "Unknown event: dance");

    let err = RollcallError::UnknownClass("NOPE".into());
    assert_eq!(err.to_string(), "Unknown class: NOPE");
}

#[test]
fn json_errors_convert_via_from() {
    let parse = serde_json::from_str::<Principal>("{").unwrap_err();
    let err: RollcallError = parse.into();
    assert!(matches!(err, RollcallError::Json(_)));
}

// ---------------------------------------------------------------------------
// 2. Principal serialization
// ---------------------------------------------------------------------------

#[test]
fn principal_serializes_with_lowercase_role() {
    let principal = Principal::student("S1");
    let json = serde_json::to_value(&principal).unwrap();
    assert_eq!(json["id"], "S1");
    assert_eq!(json["role"], "student");
    assert!(!principal.is_teacher());
    assert!(Principal::teacher("T1").is_teacher());
}

// ---------------------------------------------------------------------------
// 3. IdentityVerifier is object safe
// ---------------------------------------------------------------------------

struct FixedVerifier;

impl IdentityVerifier for FixedVerifier {
    fn verify(&self, credential: &str) -> RollcallResult<Principal> {
        match credential {
            "teach" => Ok(Principal::teacher("T1")),
            _ => Err(RollcallError::Authentication("unknown token".into())),
        }
    }
}

#[test]
fn verifier_works_behind_dyn() {
    let verifier: Box<dyn IdentityVerifier> = Box::new(FixedVerifier);
    assert_eq!(verifier.verify("teach").unwrap().role, Role::Teacher);
    assert!(matches!(
        verifier.verify("nope"),
        Err(RollcallError::Authentication(_))
    ));
}
