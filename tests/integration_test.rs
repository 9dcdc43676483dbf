//! End-to-end tests for payload-policy.
//!
//! These drive the public API the way a write endpoint would: sanitize and
//! validate a tainted payload, cast it into a transfer object, then authorize
//! the operation through the policy gate.

use std::sync::Arc;

use chrono::NaiveDate;
use payload_policy::audit::{AuditOutcome, AuditTrail};
use payload_policy::{
    Cast, CastSpec, ConfigError, EngineConfig, Error, JsonSettings, MemoryStore, MemoryUsers,
    Pipeline, Policy, PolicyGate, PostRecord, RuleEntry, SanitizationSpec, Schema, Services,
    Tainted, TransferObject, UserRecord, Validator, ViolationKind,
};
use serde::Deserialize;
use serde_json::{json, Value};

// Audit and validation events show up in the output of failing tests.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn user(id: u64, email: &str, roles: &[&str], capabilities: &[&str]) -> UserRecord {
    UserRecord {
        id,
        email: email.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
    }
}

fn services() -> Services {
    let store = MemoryStore::new();
    store.insert_row("campaign_categories", "id", json!(3));
    store.insert_post(PostRecord {
        id: 42,
        post_type: "campaign".into(),
        status: "publish".into(),
        parent: 0,
        author: 7,
    });
    store.insert_post(PostRecord {
        id: 43,
        post_type: "campaign".into(),
        status: "draft".into(),
        parent: 0,
        author: 8,
    });

    let users = MemoryUsers::new();
    users.insert(user(1, "admin@example.com", &["administrator"], &["manage_options"]));
    users.insert(user(7, "owner@example.com", &["author"], &["edit_campaigns"]));
    users.insert(user(8, "other@example.com", &["author"], &["edit_campaigns"]));
    users.insert(user(9, "backer@example.com", &["subscriber"], &[]));

    Services::default()
        .with_records(Arc::new(store))
        .with_users(Arc::new(users))
}

fn campaign_schema() -> Schema {
    Schema::new()
        .field("title", "required|string|max:60")
        .field("status", "required|in:draft,publish")
        .field("goal_type", "required_if:status,publish|in:fixed,flexible")
        .field("goal", "required_if_exists:goal_type|number|gt:0")
        .field("category", "nullable|exists:campaign_categories,id")
        .field("start_date", "required|date_format:Y-m-d")
        .field("end_date", "nullable|date|after_date:start_date")
        .field("tiers.*.amount", "required|number|min:1")
        .field("tiers.*.max", "nullable|number|greater_than_equal:min")
        .field("parent_campaign", "nullable|post_exists:post_type=campaign,status=publish")
}

fn campaign_sanitizer() -> SanitizationSpec {
    SanitizationSpec::new()
        .field("title", "text")
        .and_then(|s| s.field("status", "key"))
        .and_then(|s| s.field("tiers.*.amount", "money"))
        .and_then(|s| s.field("tiers.*.max", "money"))
        .unwrap()
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        Validator::new(services()),
        campaign_sanitizer(),
        &campaign_schema(),
    )
    .unwrap()
}

#[derive(Debug, Deserialize)]
struct Tier {
    amount: i64,
    #[serde(default)]
    max: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Campaign {
    title: String,
    status: String,
    goal_type: String,
    start_date: NaiveDate,
    tiers: Vec<Tier>,
}

impl TransferObject for Campaign {
    fn casts() -> CastSpec {
        CastSpec::new()
            .cast("start_date", Cast::Date)
            .cast("goal_type", Cast::enumeration(&["fixed", "flexible"], Some("flexible")))
            .cast("tiers.*.amount", Cast::Money)
            .cast("tiers.*.max", Cast::Money)
            .with_default("tiers", json!([]))
    }
}

#[test]
fn valid_campaign_flows_from_tainted_to_transfer_object() {
    let input = Tainted::new(json!({
        "title": "  <em>Clean</em>   water ",
        "status": "Publish",
        "goal_type": "fixed",
        "goal": "5000",
        "category": 3,
        "start_date": "2025-03-01",
        "end_date": "2025-04-01",
        "tiers": [
            {"amount": "$10", "min": 1, "max": "25.00"},
            {"amount": 50}
        ],
        "parent_campaign": 42
    }));

    let verified = pipeline().process(input).unwrap();
    let campaign = Campaign::from_verified(verified, &EngineConfig::default()).unwrap();

    assert_eq!(campaign.title, "Clean water");
    assert_eq!(campaign.status, "publish");
    assert_eq!(campaign.goal_type, "fixed");
    assert_eq!(campaign.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    assert_eq!(campaign.tiers.len(), 2);
    assert_eq!(campaign.tiers[0].amount, 1000);
    assert_eq!(campaign.tiers[0].max, Some(2500));
    assert_eq!(campaign.tiers[1].amount, 5000);
    assert_eq!(campaign.tiers[1].max, None);
}

#[test]
fn every_failing_field_is_reported_at_its_concrete_path() {
    init_tracing();
    let input = Tainted::new(json!({
        "title": "",
        "status": "publish",
        "goal": -5,
        "category": 99,
        "start_date": "03/01/2025",
        "end_date": "2025-02-01",
        "tiers": [
            {"amount": "20"},
            {"amount": "0.5"},
            {"min": 30, "max": 10}
        ],
        "parent_campaign": 43
    }));

    let report = pipeline().process(input).unwrap_err().into_report();

    assert_eq!(report.get("title").unwrap(), ["The title field is required."]);
    assert_eq!(
        report.get("goal_type").unwrap(),
        ["The goal type field is required when status is publish."]
    );
    assert!(report.has("goal"));
    assert!(report.has("category"));
    assert!(report.has("start_date"));
    assert!(report.has("tiers.1.amount"));
    assert!(report.has("tiers.2.amount"));
    assert!(report.has("tiers.2.max"));
    assert!(report.has("parent_campaign"));
    assert!(!report.has("tiers.0.amount"));
    assert!(!report.has("status"));
}

#[test]
fn optional_fields_may_be_absent_but_required_collections_may_not() {
    let input = Tainted::new(json!({
        "title": "Seeds",
        "status": "draft",
        "start_date": "2025-03-01",
        "tiers": [{"amount": 5}]
    }));
    assert!(pipeline().process(input).is_ok());

    let without_tiers = Tainted::new(json!({
        "title": "Seeds",
        "status": "draft",
        "start_date": "2025-03-01"
    }));
    let report = pipeline().process(without_tiers).unwrap_err().into_report();
    assert_eq!(report.fields().collect::<Vec<_>>(), ["tiers"]);
}

#[test]
fn required_collection_reports_at_the_parent() {
    let schema = Schema::new().field("rewards.*.title", "required|string");
    let validator = Validator::default();

    let report = validator
        .validate_schema(&json!({"rewards": []}), &schema)
        .unwrap();
    assert_eq!(report.fields().collect::<Vec<_>>(), ["rewards"]);

    let report = validator
        .validate_schema(&json!({"rewards": [{"title": "Mug"}, {}]}), &schema)
        .unwrap();
    assert_eq!(report.fields().collect::<Vec<_>>(), ["rewards.1.title"]);
}

#[test]
fn inline_predicates_run_with_the_whole_payload() {
    let mut chain = payload_policy::RuleChain::parse("required|number");
    chain.push(RuleEntry::predicate(|value, _key, payload| {
        let goal = payload["goal"].as_f64().unwrap_or(0.0);
        match value.and_then(Value::as_f64) {
            Some(v) if v <= goal => Ok(()),
            _ => Err("A tier cannot exceed the goal.".to_string()),
        }
    }));
    let schema = Schema::new().field("tiers.*.amount", chain);

    let report = Validator::default()
        .validate_schema(
            &json!({"goal": 100, "tiers": [{"amount": 50}, {"amount": 500}]}),
            &schema,
        )
        .unwrap();
    assert_eq!(
        report.get("tiers.1.amount").unwrap(),
        ["A tier cannot exceed the goal."]
    );
    assert!(!report.has("tiers.0.amount"));
}

#[test]
fn json_schema_and_sanitizer_definitions_load() {
    let schema = Schema::from_json(&json!({
        "email": "required|email|email_unique",
        "name": ["required", "string", "min:2"]
    }))
    .unwrap();
    let sanitizer = SanitizationSpec::from_json(&json!({
        "email": "email",
        "name": "text"
    }))
    .unwrap();

    let pipeline = Pipeline::new(Validator::new(services()), sanitizer, &schema).unwrap();

    let taken = pipeline
        .process(Tainted::new(json!({"email": " owner@EXAMPLE.com", "name": "Ada"})))
        .unwrap_err();
    assert_eq!(
        taken.report.get("email").unwrap(),
        ["The email has already been taken."]
    );

    assert!(pipeline
        .process(Tainted::new(json!({"email": "new@example.com", "name": "<b>Ada</b>"})))
        .is_ok());
}

#[test]
fn misconfigured_schemas_fail_at_compile_time() {
    let validator = Validator::default();
    assert_eq!(
        validator
            .compile(&Schema::new().field("x", "required|unknown_rule"))
            .unwrap_err(),
        ConfigError::UnknownRule("unknown_rule".into())
    );
    assert!(matches!(
        validator.compile(&Schema::new().field("x", "exists:a,b,c")),
        Err(ConfigError::MalformedParameter { .. })
    ));
    assert!(matches!(
        validator.compile(&Schema::new().field("x", "min")),
        Err(ConfigError::MissingParameter { .. })
    ));
    assert!(matches!(
        validator.compile(&Schema::new().field("x", "exists:campaigns")),
        Err(ConfigError::MissingCollaborator { .. })
    ));
    assert!(matches!(
        SanitizationSpec::new().field("x", "trim|shout"),
        Err(ConfigError::UnknownSanitizer(_))
    ));
}

fn campaign_policy() -> Policy {
    Policy::new("campaign")
        .check("view", |_| Ok(()))
        .check("update", |req| {
            let actor = req.require_actor()?;
            let campaign = req
                .subject(0)
                .and_then(|id| req.services.records()?.find_post(id))
                .ok_or_else(|| req.deny("campaign not found"))?;
            if campaign.author == actor.id {
                Ok(())
            } else {
                Err(req.deny("only the campaign author may edit it").into())
            }
        })
        .check("delete", |req| {
            req.require_actor()?;
            let published = req
                .subject(0)
                .and_then(|id| req.services.records()?.find_post(id))
                .is_some_and(|post| post.status == "publish");
            if published {
                Err(req.deny("cannot delete a campaign that has received contributions").into())
            } else {
                Ok(())
            }
        })
}

#[test]
fn policy_gate_dispatches_bypasses_and_audits() {
    init_tracing();
    let trail = Arc::new(AuditTrail::new());
    let gate = PolicyGate::new(services())
        .register(campaign_policy())
        .with_audit(Arc::clone(&trail));

    assert!(gate.authorize("campaign", "authorize_update", &[42], Some(7)).is_ok());

    let err = gate.authorize("campaign", "update", &[42], Some(8)).unwrap_err();
    assert!(matches!(
        err.violation().map(|v| &v.kind),
        Some(ViolationKind::Unauthorized { .. })
    ));

    let err = gate.authorize("campaign", "update", &[42], None).unwrap_err();
    assert_eq!(err.violation().unwrap().kind, ViolationKind::Unauthenticated);

    assert!(gate.authorize("campaign", "delete", &[42], Some(1)).is_ok());
    assert!(gate.authorize("campaign", "delete", &[42], Some(7)).is_err());
    assert!(gate.authorize("campaign", "delete", &[43], Some(8)).is_ok());

    let outcomes: Vec<AuditOutcome> = trail.events().iter().map(|e| e.outcome()).collect();
    assert_eq!(
        outcomes,
        [
            AuditOutcome::Allowed,
            AuditOutcome::Denied,
            AuditOutcome::Denied,
            AuditOutcome::Bypassed,
            AuditOutcome::Denied,
            AuditOutcome::Allowed,
        ]
    );
    assert_eq!(trail.events()[0].action(), "update");
    assert_eq!(trail.events()[0].subjects(), [42]);
}

#[test]
fn policy_gate_fails_closed() {
    let trail = Arc::new(AuditTrail::new());
    let gate = PolicyGate::new(services())
        .register(campaign_policy())
        .with_audit(Arc::clone(&trail));

    for actor in [None, Some(1), Some(7)] {
        assert!(matches!(
            gate.authorize("campaign", "archive", &[42], actor),
            Err(Error::Config(ConfigError::UnknownAction { .. }))
        ));
        assert!(matches!(
            gate.authorize("pledge", "view", &[1], actor),
            Err(Error::Config(ConfigError::UnknownPolicy(_)))
        ));
    }
    assert_eq!(trail.with_outcome(AuditOutcome::Error).len(), 6);
    assert!(trail.with_outcome(AuditOutcome::Bypassed).is_empty());
}

#[test]
fn bypass_capability_is_read_from_host_settings() {
    let settings = JsonSettings::new(json!({
        "payload_policy": {"bypass_capability": "edit_campaigns"}
    }));
    let users = MemoryUsers::new();
    users.insert(user(7, "owner@example.com", &["author"], &["edit_campaigns"]));
    users.insert(user(1, "admin@example.com", &["administrator"], &["manage_options"]));

    let gate = PolicyGate::new(Services::from_settings(&settings).with_users(Arc::new(users)))
        .register(Policy::new("campaign").check("delete", |req| Err(req.deny("no").into())));

    assert_eq!(gate.can("campaign", "delete", &[42], Some(7)), Ok(true));
    assert_eq!(gate.can("campaign", "delete", &[42], Some(1)), Ok(false));
}
