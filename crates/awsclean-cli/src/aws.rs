//! AWS SDK backend for the collaborator traits of `awsclean-core`.
//!
//! The core is synchronous; every call here is driven to completion on a
//! private current-thread tokio runtime.

use std::future::Future;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudtrail::primitives::DateTime as SmithyDateTime;
use aws_sdk_cloudtrail::types::{LookupAttribute, LookupAttributeKey};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::Filter;
use awsclean_core::{CleanError, GroupDescriptor};
use awsclean_core::api::{
    ApiError, AuditEvent, AuditResource, AuditTrailApi, Image, ImageApi, LogGroup, LogGroupApi, Page,
    SecurityGroupApi, Volume, VolumeApi,
};
use awsclean_core::model::SECURITY_GROUP_CREATED_EVENT;
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Error code EC2 returns when a dry-run request would have succeeded.
const DRY_RUN_OPERATION: &str = "DryRunOperation";

/// Version selector for the newest launch-template version.
const LATEST_VERSION: &str = "$Latest";

/// Clients for every service awsclean talks to.
pub struct AwsBackend {
    runtime: Runtime,
    ec2: aws_sdk_ec2::Client,
    cloudtrail: aws_sdk_cloudtrail::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
}

impl AwsBackend {
    /// Load the shared AWS configuration (environment, `~/.aws/config`,
    /// `~/.aws/credentials`) and build the service clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be started.
    pub fn connect(region: Option<String>, profile: Option<String>) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CleanError::Runtime)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = runtime.block_on(loader.load());
        debug!(region = ?config.region(), "loaded aws configuration");

        Ok(Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            cloudtrail: aws_sdk_cloudtrail::Client::new(&config),
            logs: aws_sdk_cloudwatchlogs::Client::new(&config),
            runtime,
        })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn api_error<E, R>(operation: &'static str, err: &SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let error = ApiError::new(operation, DisplayErrorContext(err).to_string());
    match err.as_service_error().and_then(ProvideErrorMetadata::code) {
        Some(code) => error.with_code(code),
        None => error,
    }
}

/// Treat the EC2 dry-run response as success.
fn accept_dry_run<T, E, R>(operation: &'static str, result: Result<T, SdkError<E, R>>) -> Result<(), ApiError>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.as_service_error().and_then(ProvideErrorMetadata::code) == Some(DRY_RUN_OPERATION) => {
            info!(operation, "request would have succeeded, but dry run was set");
            Ok(())
        }
        Err(err) => Err(api_error(operation, &err)),
    }
}

fn page<T>(items: Vec<T>, next_token: Option<&str>) -> Page<T> {
    Page {
        items,
        next_token: next_token.map(str::to_string),
    }
}

fn to_chrono(at: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}

fn to_smithy(at: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_secs(at.timestamp())
}

fn descriptor(group: &aws_sdk_ec2::types::SecurityGroup) -> GroupDescriptor {
    GroupDescriptor {
        group_id: group.group_id().map(str::to_string),
        group_name: group.group_name().map(str::to_string),
        description: group.description().map(str::to_string),
        vpc_id: group.vpc_id().map(str::to_string),
        owner_id: group.owner_id().map(str::to_string),
        tags: group
            .tags()
            .iter()
            .filter_map(|tag| Some((tag.key()?.to_string(), tag.value().unwrap_or_default().to_string())))
            .collect(),
    }
}

impl SecurityGroupApi for AwsBackend {
    fn describe_security_groups(&self, next_token: Option<&str>) -> Result<Page<GroupDescriptor>, ApiError> {
        let request = self
            .ec2
            .describe_security_groups()
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeSecurityGroups", &err))?;
        let items = output.security_groups().iter().map(descriptor).collect();
        Ok(page(items, output.next_token()))
    }

    fn attached_interfaces(&self, group_name: &str) -> Result<Vec<String>, ApiError> {
        let filter = Filter::builder().name("group-name").values(group_name).build();
        self.block_on(async {
            let mut interfaces = Vec::new();
            let mut next_token: Option<String> = None;
            loop {
                let output = self
                    .ec2
                    .describe_network_interfaces()
                    .filters(filter.clone())
                    .set_next_token(next_token.take())
                    .send()
                    .await
                    .map_err(|err| api_error("DescribeNetworkInterfaces", &err))?;
                interfaces.extend(
                    output
                        .network_interfaces()
                        .iter()
                        .filter_map(|interface| interface.network_interface_id())
                        .map(str::to_string),
                );
                match output.next_token() {
                    Some(token) => next_token = Some(token.to_string()),
                    None => break,
                }
            }
            Ok::<_, ApiError>(interfaces)
        })
    }

    fn delete_security_group(&self, group_id: &str, dry_run: bool) -> Result<(), ApiError> {
        let request = self.ec2.delete_security_group().group_id(group_id).dry_run(dry_run);
        accept_dry_run("DeleteSecurityGroup", self.block_on(request.send()))
    }
}

impl AuditTrailApi for AwsBackend {
    fn lookup_creation_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<Page<AuditEvent>, ApiError> {
        let attribute = LookupAttribute::builder()
            .attribute_key(LookupAttributeKey::EventName)
            .attribute_value(SECURITY_GROUP_CREATED_EVENT)
            .build()
            .map_err(|err| ApiError::new("LookupEvents", err.to_string()))?;
        let request = self
            .cloudtrail
            .lookup_events()
            .lookup_attributes(attribute)
            .start_time(to_smithy(start))
            .end_time(to_smithy(end))
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("LookupEvents", &err))?;

        let items = output
            .events()
            .iter()
            .map(|event| AuditEvent {
                username: event.username().unwrap_or_default().to_string(),
                event_time: event.event_time().and_then(to_chrono),
                resources: event
                    .resources()
                    .iter()
                    .map(|resource| AuditResource {
                        resource_type: resource.resource_type().unwrap_or_default().to_string(),
                        resource_name: resource.resource_name().unwrap_or_default().to_string(),
                    })
                    .collect(),
            })
            .collect();
        Ok(page(items, output.next_token()))
    }
}

impl ImageApi for AwsBackend {
    fn describe_images(&self, owners: &[String]) -> Result<Vec<Image>, ApiError> {
        let request = self.ec2.describe_images().set_owners(Some(owners.to_vec()));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeImages", &err))?;
        Ok(output
            .images()
            .iter()
            .map(|image| Image {
                image_id: image.image_id().unwrap_or_default().to_string(),
                name: image.name().unwrap_or_default().to_string(),
                creation_date: image.creation_date().unwrap_or_default().to_string(),
                owner_id: image.owner_id().map(str::to_string),
            })
            .collect())
    }

    fn instance_image_ids(&self, next_token: Option<&str>) -> Result<Page<String>, ApiError> {
        let request = self
            .ec2
            .describe_instances()
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeInstances", &err))?;
        let items = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(|instance| instance.image_id())
            .map(str::to_string)
            .collect();
        Ok(page(items, output.next_token()))
    }

    fn launch_template_image_ids(&self, next_token: Option<&str>) -> Result<Page<String>, ApiError> {
        let request = self
            .ec2
            .describe_launch_template_versions()
            .versions(LATEST_VERSION)
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeLaunchTemplateVersions", &err))?;
        let items = output
            .launch_template_versions()
            .iter()
            .filter_map(|version| version.launch_template_data()?.image_id())
            .map(str::to_string)
            .collect();
        Ok(page(items, output.next_token()))
    }

    fn deregister_image(&self, image_id: &str, dry_run: bool) -> Result<(), ApiError> {
        let request = self.ec2.deregister_image().image_id(image_id).dry_run(dry_run);
        accept_dry_run("DeregisterImage", self.block_on(request.send()))
    }
}

impl VolumeApi for AwsBackend {
    fn describe_volumes(&self, next_token: Option<&str>) -> Result<Page<Volume>, ApiError> {
        let request = self
            .ec2
            .describe_volumes()
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeVolumes", &err))?;
        let items = output
            .volumes()
            .iter()
            .map(|volume| Volume {
                volume_id: volume.volume_id().unwrap_or_default().to_string(),
                state: volume.state().map(|state| state.as_str().to_string()).unwrap_or_default(),
                create_time: volume.create_time().and_then(to_chrono),
                size_gib: volume.size(),
            })
            .collect();
        Ok(page(items, output.next_token()))
    }

    fn delete_volume(&self, volume_id: &str, dry_run: bool) -> Result<(), ApiError> {
        let request = self.ec2.delete_volume().volume_id(volume_id).dry_run(dry_run);
        accept_dry_run("DeleteVolume", self.block_on(request.send()))
    }
}

impl LogGroupApi for AwsBackend {
    fn describe_log_groups(&self, next_token: Option<&str>) -> Result<Page<LogGroup>, ApiError> {
        let request = self
            .logs
            .describe_log_groups()
            .set_next_token(next_token.map(str::to_string));
        let output = self
            .block_on(request.send())
            .map_err(|err| api_error("DescribeLogGroups", &err))?;
        let items = output
            .log_groups()
            .iter()
            .map(|group| LogGroup {
                name: group.log_group_name().unwrap_or_default().to_string(),
                creation_time: group.creation_time().and_then(DateTime::from_timestamp_millis),
                retention_days: group.retention_in_days(),
            })
            .collect();
        Ok(page(items, output.next_token()))
    }

    fn delete_log_group(&self, name: &str) -> Result<(), ApiError> {
        let request = self.logs.delete_log_group().log_group_name(name);
        self.block_on(request.send())
            .map(|_| ())
            .map_err(|err| api_error("DeleteLogGroup", &err))
    }
}
