//! End-to-end security-group runs against a scripted account.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use awsclean_core::api::{
    ApiError, AuditEvent, AuditResource, AuditTrailApi, Page, SecurityGroupApi,
};
use awsclean_core::model::SECURITY_GROUP_RESOURCE_TYPE;
use awsclean_core::reconcile::TimeWindow;
use awsclean_core::{CleanError, CreationTime, GroupDescriptor, SecurityGroupCleaner};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const DAY: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Scripted account
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeAccount {
    groups: Vec<GroupDescriptor>,
    inventory_error: Option<ApiError>,
    attachments: HashMap<String, Vec<String>>,
    failing_attachment: Option<String>,
    events: Vec<AuditEvent>,
    trail_error: Option<ApiError>,
    trail_fails_on_second_page: bool,
    attachment_queries: RefCell<Vec<String>>,
    deletes: RefCell<Vec<(String, bool)>>,
}

impl FakeAccount {
    fn with_groups(groups: &[(&str, &str)]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|(id, name)| GroupDescriptor::new(*id, *name))
                .collect(),
            ..Self::default()
        }
    }

    fn created(mut self, resource: &str, user: &str, at: DateTime<Utc>) -> Self {
        self.events.push(AuditEvent {
            username: user.to_string(),
            event_time: Some(at),
            resources: vec![AuditResource {
                resource_type: SECURITY_GROUP_RESOURCE_TYPE.to_string(),
                resource_name: resource.to_string(),
            }],
        });
        self
    }
}

impl SecurityGroupApi for FakeAccount {
    fn describe_security_groups(&self, _next_token: Option<&str>) -> Result<Page<GroupDescriptor>, ApiError> {
        match &self.inventory_error {
            Some(err) => Err(err.clone()),
            None => Ok(Page::last(self.groups.clone())),
        }
    }

    fn attached_interfaces(&self, group_name: &str) -> Result<Vec<String>, ApiError> {
        self.attachment_queries.borrow_mut().push(group_name.to_string());
        if self.failing_attachment.as_deref() == Some(group_name) {
            return Err(ApiError::new("DescribeNetworkInterfaces", "throttled"));
        }
        Ok(self.attachments.get(group_name).cloned().unwrap_or_default())
    }

    fn delete_security_group(&self, group_id: &str, dry_run: bool) -> Result<(), ApiError> {
        self.deletes.borrow_mut().push((group_id.to_string(), dry_run));
        Ok(())
    }
}

impl AuditTrailApi for FakeAccount {
    fn lookup_creation_events(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<Page<AuditEvent>, ApiError> {
        if let Some(err) = &self.trail_error {
            return Err(err.clone());
        }
        match (self.trail_fails_on_second_page, next_token) {
            (false, _) => Ok(Page::last(self.events.clone())),
            (true, None) => Ok(Page::more(self.events.clone(), "page-2")),
            (true, Some(_)) => Err(ApiError::new("LookupEvents", "rate exceeded").with_code("ThrottlingException")),
        }
    }
}

fn cleaner() -> SecurityGroupCleaner {
    SecurityGroupCleaner {
        page_delay: Duration::ZERO,
        ..SecurityGroupCleaner::default()
    }
}

fn window(now: DateTime<Utc>, days: u64) -> TimeWindow {
    TimeWindow::lookback(now, Duration::from_secs(days * DAY))
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[test]
fn in_retention_window_drops_groups_missing_from_trail() {
    let now = Utc::now();
    let account = FakeAccount::with_groups(&[("sg-a", "a"), ("sg-b", "b")]).created("sg-a", "alice", now - TimeDelta::days(3));

    let reconciled = cleaner().collect(&account, &account, window(now, 30), now).expect("collect");

    assert_eq!(reconciled.groups.names().collect::<Vec<_>>(), vec!["a"]);
    let a = reconciled.groups.get("a").expect("a");
    assert_eq!(a.creator, "alice");
    assert_eq!(reconciled.outcome.dropped, vec!["b".to_string()]);
}

#[test]
fn beyond_retention_keeps_groups_with_known_unknown_creation() {
    let now = Utc::now();
    let account = FakeAccount::with_groups(&[("sg-a", "a"), ("sg-b", "b")]).created("sg-a", "alice", now - TimeDelta::days(3));

    let reconciled = cleaner().collect(&account, &account, window(now, 365), now).expect("collect");

    assert_eq!(reconciled.groups.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(reconciled.groups.get("b").expect("b").creation_time, CreationTime::KnownUnknown);
    assert!(matches!(reconciled.groups.get("a").expect("a").creation_time, CreationTime::Known { .. }));
}

#[test]
fn trail_entries_for_deleted_groups_are_not_resurrected() {
    let now = Utc::now();
    let account = FakeAccount::with_groups(&[("sg-a", "a")])
        .created("sg-a", "alice", now)
        .created("sg-gone", "bob", now);

    let reconciled = cleaner().collect(&account, &account, window(now, 30), now).expect("collect");

    assert_eq!(reconciled.groups.len(), 1);
    assert_eq!(reconciled.outcome.stale, vec!["sg-gone".to_string()]);
}

#[test]
fn trail_failure_degrades_to_unknown_creation() {
    let now = Utc::now();
    let account = FakeAccount {
        trail_error: Some(ApiError::new("LookupEvents", "rate exceeded")),
        ..FakeAccount::with_groups(&[("sg-a", "a")])
    };

    let reconciled = cleaner().collect(&account, &account, window(now, 365), now).expect("collect");
    assert_eq!(reconciled.groups.get("a").expect("a").creation_time, CreationTime::KnownUnknown);
}

#[test]
fn failed_trail_page_inside_retention_keeps_unreached_groups() {
    let now = Utc::now();
    let account = FakeAccount {
        trail_fails_on_second_page: true,
        ..FakeAccount::with_groups(&[("sg-a", "a"), ("sg-b", "b")]).created("sg-a", "alice", now - TimeDelta::days(3))
    };

    let reconciled = cleaner().collect(&account, &account, window(now, 30), now).expect("collect");

    assert_eq!(reconciled.groups.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(reconciled.groups.get("a").expect("a").creator, "alice");
    assert_eq!(reconciled.groups.get("b").expect("b").creation_time, CreationTime::KnownUnknown);
    assert!(reconciled.outcome.dropped.is_empty());
}

#[test]
fn inventory_failure_is_fatal() {
    let now = Utc::now();
    let account = FakeAccount {
        inventory_error: Some(ApiError::new("DescribeSecurityGroups", "denied")),
        ..FakeAccount::default()
    };

    let err = cleaner().collect(&account, &account, window(now, 30), now).expect_err("inventory fails");
    assert!(matches!(err, CleanError::Inventory(_)));
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

#[test]
fn usage_is_skipped_without_filter_or_threshold() {
    let now = Utc::now();
    let account = FakeAccount::with_groups(&[("sg-a", "a")]).created("sg-a", "alice", now);

    let reconciled = cleaner().collect(&account, &account, window(now, 30), now).expect("collect");

    assert!(reconciled.usage.is_none());
    assert!(account.attachment_queries.borrow().is_empty());
    assert_eq!(reconciled.listing().len(), 1);
}

#[test]
fn only_unused_listing_hides_used_groups() {
    let now = Utc::now();
    let mut account = FakeAccount::with_groups(&[("sg-a", "a"), ("sg-b", "b")])
        .created("sg-a", "alice", now)
        .created("sg-b", "bob", now);
    account.attachments.insert("a".into(), vec!["eni-1".into()]);

    let only_unused = SecurityGroupCleaner {
        only_unused: true,
        ..cleaner()
    };
    let reconciled = only_unused.collect(&account, &account, window(now, 30), now).expect("collect");

    let listed: Vec<&str> = reconciled.listing().iter().map(|group| group.display_name()).collect();
    assert_eq!(listed, vec!["b"]);
    let split = reconciled.usage.as_ref().expect("usage computed");
    assert_eq!(split.used.get("a").expect("a").attached_interfaces, vec!["eni-1".to_string()]);
}

#[test]
fn usage_failure_carries_partial_split() {
    let now = Utc::now();
    let account = FakeAccount {
        failing_attachment: Some("b".into()),
        ..FakeAccount::with_groups(&[("sg-a", "a"), ("sg-b", "b")])
            .created("sg-a", "alice", now)
            .created("sg-b", "bob", now)
    };
    let only_unused = SecurityGroupCleaner {
        only_unused: true,
        ..cleaner()
    };

    let err = only_unused.collect(&account, &account, window(now, 30), now).expect_err("usage fails");
    let usage = match err {
        CleanError::Usage(usage) => usage,
        other => panic!("expected usage error, got {other:?}"),
    };
    assert_eq!(usage.group_name, "b");
    assert!(usage.partial.unused.contains("a"));
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

fn aged_account(now: DateTime<Utc>) -> FakeAccount {
    FakeAccount::with_groups(&[("sg-old", "old"), ("sg-young", "young")])
        .created("sg-old", "alice", now - TimeDelta::days(8))
        .created("sg-young", "bob", now - TimeDelta::days(5))
}

#[test]
fn threshold_deletes_only_groups_older_than_it() {
    let now = Utc::now();
    let account = aged_account(now);
    let week = SecurityGroupCleaner {
        older_then: Some(Duration::from_secs(7 * DAY)),
        ..cleaner()
    };

    let report = week.delete(&account, &account, window(now, 30), now).expect("delete");

    assert_eq!(*account.deletes.borrow(), vec![("sg-old".to_string(), false)]);
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "sg-young");
}

#[test]
fn dry_run_passes_flag_to_delete_call() {
    let now = Utc::now();
    let account = aged_account(now);
    let dry = SecurityGroupCleaner {
        older_then: Some(Duration::from_secs(7 * DAY)),
        dry_run: true,
        ..cleaner()
    };

    let report = dry.delete(&account, &account, window(now, 30), now).expect("delete");

    assert_eq!(*account.deletes.borrow(), vec![("sg-old".to_string(), true)]);
    assert!(report.dry_run);
}

#[test]
fn used_groups_are_not_deleted() {
    let now = Utc::now();
    let mut account = aged_account(now);
    account.attachments.insert("old".into(), vec!["eni-1".into()]);
    let week = SecurityGroupCleaner {
        older_then: Some(Duration::from_secs(7 * DAY)),
        ..cleaner()
    };

    let report = week.delete(&account, &account, window(now, 30), now).expect("delete");

    assert!(account.deletes.borrow().is_empty());
    assert!(report.skipped.iter().any(|entry| entry.id == "sg-old" && entry.reason.as_deref() == Some("in use")));
}

#[test]
fn known_unknown_creation_blocks_threshold_deletion_only() {
    let now = Utc::now();
    let account = FakeAccount::with_groups(&[("sg-a", "a")]);

    let week = SecurityGroupCleaner {
        older_then: Some(Duration::from_secs(7 * DAY)),
        ..cleaner()
    };
    week.delete(&account, &account, window(now, 365), now).expect("delete");
    assert!(account.deletes.borrow().is_empty());

    cleaner().delete(&account, &account, window(now, 365), now).expect("delete");
    assert_eq!(*account.deletes.borrow(), vec![("sg-a".to_string(), false)]);
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

struct Capture(Arc<Mutex<Vec<(tracing::Level, String)>>>);

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.0
            .lock()
            .expect("capture lock")
            .push((*event.metadata().level(), visitor.0));
    }
}

#[test]
fn degraded_trail_and_stale_entries_are_logged() {
    let now = Utc::now();
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&events)));

    let failing = FakeAccount {
        trail_error: Some(ApiError::new("LookupEvents", "rate exceeded")),
        ..FakeAccount::with_groups(&[("sg-a", "a")])
    };
    let stale = FakeAccount::with_groups(&[("sg-a", "a")]).created("sg-gone", "bob", now);

    let degraded = tracing::subscriber::with_default(subscriber, || {
        let degraded = cleaner().collect(&failing, &failing, window(now, 30), now).expect("collect");
        cleaner().collect(&stale, &stale, window(now, 30), now).expect("collect");
        degraded
    });

    assert_eq!(degraded.groups.names().collect::<Vec<_>>(), vec!["a"]);

    let events = events.lock().expect("capture lock");
    assert!(events.iter().any(|(level, message)| {
        *level == tracing::Level::ERROR && message.contains("audit trail lookup failed")
    }));
    assert!(events.iter().any(|(level, message)| {
        *level == tracing::Level::WARN && message.contains("audit trail incomplete")
    }));
    assert!(events
        .iter()
        .any(|(_, message)| message.contains("missing from inventory")));
}
