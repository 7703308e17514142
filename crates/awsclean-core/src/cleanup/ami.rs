use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, error, info, info_span};

use super::drain_best_effort;
use crate::api::{Image, ImageApi};
use crate::duration::cutoff;
use crate::error::CleanError;
use crate::pattern::IgnorePatterns;
use crate::report::DeletionReport;

/// Creation date format of images, e.g. `2024-01-31T10:00:00.000Z`.
pub const IMAGE_CREATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Parse an image creation date.
///
/// # Errors
///
/// Returns the chrono parse error for any other format.
pub fn parse_image_creation_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, IMAGE_CREATION_DATE_FORMAT).map(|naive| naive.and_utc())
}

/// Images split by whether an instance or launch template references them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInventory {
    pub used: Vec<Image>,
    pub unused: Vec<Image>,
    only_unused: bool,
}

impl ImageInventory {
    /// Unused images, followed by used ones unless only unused were asked for.
    #[must_use]
    pub fn listing(&self) -> Vec<&Image> {
        let used: &[Image] = if self.only_unused { &[] } else { &self.used };
        self.unused.iter().chain(used).collect()
    }
}

/// Machine image cleanup.
#[derive(Debug, Clone, Default)]
pub struct AmiCleaner {
    pub older_then: Duration,
    /// Additional owner account besides `self`.
    pub account: Option<String>,
    pub dry_run: bool,
    pub only_unused: bool,
    /// Also count images referenced by `$Latest` launch template versions.
    pub launch_templates: bool,
    pub ignore: IgnorePatterns,
}

impl AmiCleaner {
    /// `self` plus the configured account.
    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        let mut owners = vec!["self".to_string()];
        owners.extend(self.account.iter().cloned());
        owners
    }

    /// Split owned images into used and unused.
    ///
    /// Instance and launch template listings are best effort; the image
    /// listing is not.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::Images`] when images cannot be described.
    pub fn collect<A>(&self, api: &A) -> Result<ImageInventory, CleanError>
    where
        A: ImageApi + ?Sized,
    {
        let _span = info_span!("amis").entered();

        let mut used_ids: BTreeSet<String> = drain_best_effort("DescribeInstances", |token| api.instance_image_ids(token))
            .into_iter()
            .collect();
        if self.launch_templates {
            used_ids.extend(drain_best_effort("DescribeLaunchTemplateVersions", |token| {
                api.launch_template_image_ids(token)
            }));
        }
        debug!(count = used_ids.len(), "images referenced by instances");

        let images = api.describe_images(&self.owners()).map_err(CleanError::Images)?;
        let (used, unused): (Vec<Image>, Vec<Image>) =
            images.into_iter().partition(|image| used_ids.contains(&image.image_id));
        for image in &used {
            info!(image_id = %image.image_id, "in use, ignored");
        }

        Ok(ImageInventory {
            used,
            unused,
            only_unused: self.only_unused,
        })
    }

    /// Deregister unused images older than the threshold whose name matches
    /// no ignore pattern.
    ///
    /// # Errors
    ///
    /// - Listing errors from [`AmiCleaner::collect`].
    /// - [`CleanError::CreationDate`] for an unparsable creation date; images
    ///   handled before it keep their outcome.
    pub fn delete<A>(&self, api: &A, now: DateTime<Utc>) -> Result<DeletionReport, CleanError>
    where
        A: ImageApi + ?Sized,
    {
        let inventory = self.collect(api)?;
        let _span = info_span!("delete", dry_run = self.dry_run).entered();
        let older_then_date = cutoff(now, self.older_then);
        let mut report = DeletionReport::new(self.dry_run);

        for image in &inventory.unused {
            if self.ignore.matches_any(&image.name) {
                info!(image_id = %image.image_id, name = %image.name, "skipping, name is ignored");
                report.push_skipped(&image.image_id, &image.name, "ignored");
                continue;
            }

            let created = parse_image_creation_date(&image.creation_date).map_err(|source| {
                CleanError::CreationDate {
                    resource: image.image_id.clone(),
                    value: image.creation_date.clone(),
                    source,
                }
            })?;

            if created >= older_then_date {
                info!(image_id = %image.image_id, created = %image.creation_date, "keeping, newer than {older_then_date}");
                report.push_skipped(&image.image_id, &image.name, format!("created {}", image.creation_date));
                continue;
            }

            info!(image_id = %image.image_id, created = %image.creation_date, "deregistering image");
            match api.deregister_image(&image.image_id, self.dry_run) {
                Ok(()) => report.push_deleted(&image.image_id, &image.name),
                Err(err) => {
                    error!(image_id = %image.image_id, error = %err, "error deregistering image");
                    report.push_failed(&image.image_id, &image.name, err.to_string());
                }
            }
        }

        info!("{}", report.summary());
        Ok(report)
    }
}
