//! Property tests for the pure pieces: policy evaluation, identifier
//! validation, password policy and audit scrubbing.

use authgate::{
    Action, AuditEntry, AuditOutcome, AuditSink, MemoryAuditSink, PasswordPolicy, PolicyEngine,
    Principal, PrincipalStatus, Resource, Role, Visibility, validate,
};
use proptest::prelude::*;
use uuid::Uuid;

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Admin)]
}

fn arb_status() -> impl Strategy<Value = PrincipalStatus> {
    prop_oneof![Just(PrincipalStatus::Active), Just(PrincipalStatus::Locked)]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Read), Just(Action::Write), Just(Action::Delete)]
}

fn arb_visibility() -> impl Strategy<Value = Visibility> {
    prop_oneof![Just(Visibility::Public), Just(Visibility::Private)]
}

fn principal(role: Role, status: PrincipalStatus) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        username: "subject".to_string(),
        email: "s@x.com".to_string(),
        role,
        status,
        created_at: chrono::Utc::now(),
    }
}

fn resource(owner: Uuid, visibility: Visibility) -> Resource {
    Resource {
        id: validate::resource_id("res-1").unwrap(),
        owner,
        visibility,
    }
}

proptest! {
    /// The decision always matches the written rule table; in particular,
    /// anything the table does not explicitly allow is denied.
    #[test]
    fn decision_matches_the_rule_table(
        role in arb_role(),
        status in arb_status(),
        action in arb_action(),
        visibility in arb_visibility(),
        is_owner in any::<bool>(),
        is_anonymous in any::<bool>(),
    ) {
        let engine = PolicyEngine::default();
        let p = principal(role, status);
        let owner = if is_owner && !is_anonymous { p.id } else { Uuid::new_v4() };
        let res = resource(owner, visibility);
        let subject = if is_anonymous { None } else { Some(&p) };

        let expected_allow = if subject.is_some() && status == PrincipalStatus::Locked {
            false
        } else if visibility == Visibility::Public && action == Action::Read {
            true
        } else if let Some(p) = subject {
            p.id == res.owner || p.role == Role::Admin
        } else {
            false
        };

        let decision = engine.authorize(subject, &res, action);
        prop_assert_eq!(decision.is_allow(), expected_allow, "decision {:?}", decision);
    }

    /// Pure function: identical inputs, identical decision, every time.
    #[test]
    fn evaluation_is_deterministic(
        role in arb_role(),
        status in arb_status(),
        action in arb_action(),
        visibility in arb_visibility(),
    ) {
        let engine = PolicyEngine::default();
        let p = principal(role, status);
        let res = resource(Uuid::new_v4(), visibility);

        let first = engine.authorize(Some(&p), &res, action);
        for _ in 0..3 {
            prop_assert_eq!(engine.authorize(Some(&p), &res, action), first);
        }
    }

    /// Anonymous callers are never admitted beyond a public read.
    #[test]
    fn anonymous_is_public_read_only(
        action in arb_action(),
        visibility in arb_visibility(),
    ) {
        let engine = PolicyEngine::default();
        let res = resource(Uuid::new_v4(), visibility);

        let decision = engine.authorize(None, &res, action);
        let only_allowed_case =
            visibility == Visibility::Public && action == Action::Read;
        prop_assert_eq!(decision.is_allow(), only_allowed_case);
    }

    /// Identifiers containing separators, traversal or shell
    /// metacharacters never validate.
    #[test]
    fn hostile_identifiers_never_validate(
        prefix in "[a-z0-9]{0,8}",
        hostile in prop_oneof![
            Just("/"), Just("\\"), Just(".."), Just(";"), Just("|"),
            Just("&"), Just("$"), Just("`"), Just(" "), Just("'"),
            Just("\""), Just("\n"), Just("\0"),
        ],
        suffix in "[a-z0-9]{0,8}",
    ) {
        let candidate = format!("{prefix}{hostile}{suffix}");
        prop_assert!(validate::resource_id(&candidate).is_err(), "{candidate:?} validated");
    }

    /// Everything inside the allow-list validates and round-trips
    /// unchanged.
    #[test]
    fn allow_listed_identifiers_validate(id in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,63}") {
        // The strategy avoids dots entirely, so ".." cannot occur.
        let validated = validate::resource_id(&id);
        prop_assert!(validated.is_ok(), "{id:?} rejected");
        let validated = validated.unwrap();
        prop_assert_eq!(validated.as_str(), id.as_str());
    }

    /// Short passwords are always rejected, whatever their content.
    #[test]
    fn short_passwords_are_weak(raw in ".{0,9}") {
        let policy = PasswordPolicy::default();
        prop_assert!(policy.check(&raw, "alice").is_err());
    }

    /// Secret-shaped field keys are always redacted by the sink, and no
    /// control character survives in any string field.
    #[test]
    fn sink_scrubs_secret_fields(
        key_prefix in "[a-z]{0,6}",
        secret in ".{1,30}",
        note in ".{0,30}",
    ) {
        let key = format!("{key_prefix}_password");
        let sink = MemoryAuditSink::new();
        sink.record(
            AuditEntry::new("subject", "login", AuditOutcome::Rejected, "invalid_credential")
                .field(&key, serde_json::json!(secret))
                .field("note", serde_json::json!(note)),
        );

        let entries = sink.entries();
        prop_assert_eq!(entries.len(), 1);
        prop_assert_eq!(&entries[0].fields[&key], &serde_json::json!("[REDACTED]"));
        if let Some(logged) = entries[0].fields["note"].as_str() {
            prop_assert!(!logged.chars().any(|c| c.is_control()));
        }
    }
}
