use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info_span, warn};

use crate::api::{AuditEvent, AuditTrailApi};
use crate::model::{CreationTime, SECURITY_GROUP_RESOURCE_TYPE, SecurityGroup};
use crate::registry::SecurityGroups;

/// Fixed delay before each audit-trail page (the lookup API is rate limited).
pub const DEFAULT_AUDIT_PAGE_DELAY: Duration = Duration::from_secs(5);

/// Creation evidence gathered by [`audit_trail_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailEvidence {
    /// Evidence records keyed by the resource name the trail reports.
    pub groups: SecurityGroups,
    /// `false` when a page failed and later pages were never read.
    pub complete: bool,
}

/// Gather creator and creation time of security groups created in
/// `[start, end]`.
///
/// Sleeps `page_delay` before every page. A failing page is logged and ends
/// pagination: whatever was gathered so far is returned, flagged incomplete.
/// Records are keyed by the resource name the trail reports, which may be a
/// group id.
#[must_use]
pub fn audit_trail_pass<T>(trail: &T, start: DateTime<Utc>, end: DateTime<Utc>, page_delay: Duration) -> TrailEvidence
where
    T: AuditTrailApi + ?Sized,
{
    let _span = info_span!("audit_trail", %start, %end).entered();

    let mut groups = SecurityGroups::new();
    let mut next_token: Option<String> = None;
    let complete = loop {
        if !page_delay.is_zero() {
            std::thread::sleep(page_delay);
        }

        let page = match trail.lookup_creation_events(start, end, next_token.as_deref()) {
            Ok(page) => page,
            Err(err) => {
                error!(error = %err, "audit trail lookup failed, using partial results");
                break false;
            }
        };

        for collision in groups.append_all(evidence_from_events(&page.items)) {
            warn!(error = %collision, "audit trail: conflicting evidence");
        }

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break true,
        }
    };

    debug!(groups = groups.len(), complete, "audit trail done");
    TrailEvidence { groups, complete }
}

/// Creation evidence carried by one page of events.
///
/// Only resources of type `AWS::EC2::SecurityGroup` count. When a page names
/// the same resource twice, the later event wins.
#[must_use]
pub fn evidence_from_events(events: &[AuditEvent]) -> SecurityGroups {
    events
        .iter()
        .flat_map(|event| {
            event
                .resources
                .iter()
                .filter(|resource| resource.resource_type == SECURITY_GROUP_RESOURCE_TYPE)
                .map(move |resource| {
                    SecurityGroup::evidence(resource.resource_name.clone())
                        .with_creation(event.username.clone(), CreationTime::from_event_time(event.event_time))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, AuditResource, Page};
    use chrono::TimeDelta;
    use std::cell::RefCell;

    fn event(user: &str, at: Option<DateTime<Utc>>, resources: &[(&str, &str)]) -> AuditEvent {
        AuditEvent {
            username: user.to_string(),
            event_time: at,
            resources: resources
                .iter()
                .map(|(kind, name)| AuditResource {
                    resource_type: (*kind).to_string(),
                    resource_name: (*name).to_string(),
                })
                .collect(),
        }
    }

    struct ScriptedTrail {
        pages: RefCell<Vec<Result<Page<AuditEvent>, ApiError>>>,
        calls: RefCell<usize>,
    }

    impl ScriptedTrail {
        fn new(mut pages: Vec<Result<Page<AuditEvent>, ApiError>>) -> Self {
            pages.reverse();
            Self {
                pages: RefCell::new(pages),
                calls: RefCell::new(0),
            }
        }
    }

    impl AuditTrailApi for ScriptedTrail {
        fn lookup_creation_events(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _next_token: Option<&str>,
        ) -> Result<Page<AuditEvent>, ApiError> {
            *self.calls.borrow_mut() += 1;
            self.pages
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(Page::last(Vec::new())))
        }
    }

    #[test]
    fn keeps_only_security_group_resources() {
        let at = Utc::now();
        let evidence = evidence_from_events(&[event(
            "alice",
            Some(at),
            &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-1"), ("AWS::EC2::Vpc", "vpc-1")],
        )]);

        assert_eq!(evidence.names().collect::<Vec<_>>(), vec!["sg-1"]);
        let group = evidence.get("sg-1").expect("sg-1");
        assert_eq!(group.creator, "alice");
        assert_eq!(group.creation_time, CreationTime::known(at));
        assert!(group.descriptor.is_none());
    }

    #[test]
    fn missing_event_time_stays_unknown() {
        let evidence = evidence_from_events(&[event("bob", None, &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-2")])]);
        assert_eq!(evidence.get("sg-2").expect("sg-2").creation_time, CreationTime::Unknown);
    }

    #[test]
    fn merges_pages_first_seen_wins() {
        let early = Utc::now() - TimeDelta::days(3);
        let late = Utc::now();
        let trail = ScriptedTrail::new(vec![
            Ok(Page::more(
                vec![event("alice", Some(early), &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-1")])],
                "t1",
            )),
            Ok(Page::last(vec![
                event("bob", Some(late), &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-1")]),
                event("carol", Some(late), &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-2")]),
            ])),
        ]);

        let evidence = audit_trail_pass(&trail, early, late, Duration::ZERO);
        assert!(evidence.complete);
        let groups = evidence.groups;
        assert_eq!(groups.len(), 2);
        let first = groups.get("sg-1").expect("sg-1");
        assert_eq!(first.creator, "alice");
        assert_eq!(first.creation_time, CreationTime::known(early));
        assert_eq!(*trail.calls.borrow(), 2);
    }

    #[test]
    fn failed_page_ends_pagination_with_partial_results() {
        let now = Utc::now();
        let trail = ScriptedTrail::new(vec![
            Ok(Page::more(
                vec![event("alice", Some(now), &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-1")])],
                "t1",
            )),
            Err(ApiError::new("LookupEvents", "rate exceeded").with_code("ThrottlingException")),
            Ok(Page::last(vec![event("bob", Some(now), &[(SECURITY_GROUP_RESOURCE_TYPE, "sg-9")])])),
        ]);

        let evidence = audit_trail_pass(&trail, now, now, Duration::ZERO);
        assert!(!evidence.complete);
        assert_eq!(evidence.groups.names().collect::<Vec<_>>(), vec!["sg-1"]);
        assert_eq!(*trail.calls.borrow(), 2);
    }
}
