use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span};

use super::drain_best_effort;
use crate::api::{Volume, VolumeApi};
use crate::duration::cutoff;
use crate::report::DeletionReport;

/// Volumes split by attachment state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeInventory {
    pub used: Vec<Volume>,
    pub unused: Vec<Volume>,
    only_unused: bool,
}

impl VolumeInventory {
    #[must_use]
    pub fn listing(&self) -> Vec<&Volume> {
        let used: &[Volume] = if self.only_unused { &[] } else { &self.used };
        self.unused.iter().chain(used).collect()
    }
}

/// EBS volume cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EbsCleaner {
    pub older_then: Duration,
    pub dry_run: bool,
    pub only_unused: bool,
}

impl EbsCleaner {
    /// List volumes; anything not `in-use` is unused. Listing is best effort.
    #[must_use]
    pub fn collect<A>(&self, api: &A) -> VolumeInventory
    where
        A: VolumeApi + ?Sized,
    {
        let _span = info_span!("volumes").entered();

        let (used, unused): (Vec<Volume>, Vec<Volume>) =
            drain_best_effort("DescribeVolumes", |token| api.describe_volumes(token))
                .into_iter()
                .partition(Volume::is_in_use);
        for volume in &used {
            info!(volume_id = %volume.volume_id, "in use");
        }

        VolumeInventory {
            used,
            unused,
            only_unused: self.only_unused,
        }
    }

    /// Delete unused volumes created before `now - older_then`.
    #[must_use]
    pub fn delete<A>(&self, api: &A, now: DateTime<Utc>) -> DeletionReport
    where
        A: VolumeApi + ?Sized,
    {
        let inventory = self.collect(api);
        let _span = info_span!("delete", dry_run = self.dry_run).entered();
        let older_then_date = cutoff(now, self.older_then);
        debug!(%older_then_date, "deleting volumes created before");
        let mut report = DeletionReport::new(self.dry_run);

        for volume in &inventory.unused {
            let id = volume.volume_id.as_str();
            match volume.create_time {
                Some(created) if created < older_then_date => {}
                Some(created) => {
                    info!(volume_id = %id, %created, "skipping, too recent");
                    report.push_skipped(id, id, format!("created {created}"));
                    continue;
                }
                None => {
                    info!(volume_id = %id, "skipping, creation time unknown");
                    report.push_skipped(id, id, "creation time unknown");
                    continue;
                }
            }

            info!(volume_id = %id, "deleting volume");
            match api.delete_volume(id, self.dry_run) {
                Ok(()) => report.push_deleted(id, id),
                Err(err) => {
                    error!(volume_id = %id, error = %err, "error deleting volume");
                    report.push_failed(id, id, err.to_string());
                }
            }
        }

        info!("{} EBS volumes", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, Page};
    use chrono::TimeDelta;
    use std::cell::RefCell;

    struct FakeVolumes {
        volumes: Vec<Volume>,
        deleted: RefCell<Vec<(String, bool)>>,
    }

    impl VolumeApi for FakeVolumes {
        fn describe_volumes(&self, next_token: Option<&str>) -> Result<Page<Volume>, ApiError> {
            match next_token {
                None => Ok(Page::more(self.volumes.clone(), "next")),
                Some(_) => Err(ApiError::new("DescribeVolumes", "throttled")),
            }
        }

        fn delete_volume(&self, volume_id: &str, dry_run: bool) -> Result<(), ApiError> {
            self.deleted.borrow_mut().push((volume_id.to_string(), dry_run));
            if volume_id == "vol-locked" {
                return Err(ApiError::new("DeleteVolume", "VolumeInUse"));
            }
            Ok(())
        }
    }

    fn volume(id: &str, state: &str, created: Option<DateTime<Utc>>) -> Volume {
        Volume {
            volume_id: id.to_string(),
            state: state.to_string(),
            create_time: created,
            size_gib: Some(8),
        }
    }

    #[test]
    fn deletes_only_old_unattached_volumes() {
        let now = Utc::now();
        let api = FakeVolumes {
            volumes: vec![
                volume("vol-old", "available", Some(now - TimeDelta::days(30))),
                volume("vol-new", "available", Some(now - TimeDelta::days(1))),
                volume("vol-attached", "in-use", Some(now - TimeDelta::days(30))),
                volume("vol-locked", "available", Some(now - TimeDelta::days(30))),
            ],
            deleted: RefCell::new(Vec::new()),
        };
        let cleaner = EbsCleaner {
            older_then: Duration::from_secs(7 * 24 * 60 * 60),
            dry_run: false,
            only_unused: false,
        };

        let report = cleaner.delete(&api, now);

        let deleted: Vec<String> = api.deleted.borrow().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(deleted, vec!["vol-old", "vol-locked"]);
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn listing_respects_only_unused() {
        let now = Utc::now();
        let api = FakeVolumes {
            volumes: vec![volume("vol-1", "available", Some(now)), volume("vol-2", "in-use", Some(now))],
            deleted: RefCell::new(Vec::new()),
        };
        let all = EbsCleaner::default().collect(&api);
        assert_eq!(all.listing().len(), 2);

        let unused = EbsCleaner {
            only_unused: true,
            ..EbsCleaner::default()
        }
        .collect(&api);
        assert_eq!(unused.listing().len(), 1);
        assert_eq!(unused.listing()[0].volume_id, "vol-1");
    }
}
