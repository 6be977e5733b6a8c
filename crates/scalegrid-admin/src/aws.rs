//! Cloud provisioner driving the `aws` CLI.
//!
//! Provisioning is three CLI calls: `ec2 run-instances`, then
//! `ec2 wait instance-exists`, then `ec2 wait instance-running`. Each call
//! is bounded by the attempt timeout and the whole sequence by the API-call
//! timeout. Connect and read timeouts are handed to the CLI itself.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

use scalegrid_executor::{ExecError, ExecResult, LifecycleBackend};
use scalegrid_scaler::Provisioner;

use crate::process;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsCliConfig {
    pub program: String,
    pub profile: Option<String>,
    /// Region used for lifecycle calls on machines this process did not
    /// provision. Falls back to the CLI's own configuration when unset.
    pub region: Option<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub attempt_timeout_secs: u64,
    pub api_call_timeout_secs: u64,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            profile: None,
            region: None,
            connect_timeout_secs: 60,
            read_timeout_secs: 60,
            attempt_timeout_secs: 90,
            api_call_timeout_secs: 120,
        }
    }
}

pub struct AwsCliProvisioner {
    config: AwsCliConfig,
    /// Region of every machine provisioned by this instance.
    regions: Mutex<HashMap<String, String>>,
}

/// Validate the instance id printed by `run-instances --output text`.
pub fn parse_instance_id(output: &str) -> ExecResult<String> {
    let re = Regex::new(r"^i-[0-9a-f]{8,17}$")
        .map_err(|e| ExecError::MalformedOperationResult(e.to_string()))?;
    let id = output.trim();
    if re.is_match(id) {
        Ok(id.to_string())
    } else {
        Err(ExecError::MalformedOperationResult(format!(
            "run-instances did not return an instance id: {output:?}"
        )))
    }
}

impl AwsCliProvisioner {
    pub fn new(config: AwsCliConfig) -> Self {
        Self {
            config,
            regions: Mutex::new(HashMap::new()),
        }
    }

    /// Full argument list for one `aws ec2 ...` call.
    fn ec2_args(&self, region: Option<&str>, args: &[&str]) -> Vec<String> {
        let mut full = vec!["ec2".to_string()];
        full.extend(args.iter().map(|a| a.to_string()));
        if let Some(region) = region {
            full.push("--region".to_string());
            full.push(region.to_string());
        }
        if let Some(profile) = &self.config.profile {
            full.push("--profile".to_string());
            full.push(profile.clone());
        }
        full.push("--cli-connect-timeout".to_string());
        full.push(self.config.connect_timeout_secs.to_string());
        full.push("--cli-read-timeout".to_string());
        full.push(self.config.read_timeout_secs.to_string());
        full
    }

    /// One CLI call bounded by the attempt timeout.
    async fn attempt(&self, region: Option<&str>, args: &[&str]) -> ExecResult<String> {
        let budget = Duration::from_secs(self.config.attempt_timeout_secs);
        let full = self.ec2_args(region, args);
        let step = args.first().copied().unwrap_or("ec2");
        timeout(budget, process::run(&self.config.program, &full))
            .await
            .map_err(|_| ExecError::TimedOut {
                operation: format!("aws ec2 {step}"),
                target: args.last().copied().unwrap_or_default().to_string(),
                budget,
            })?
    }

    async fn region_of(&self, instance: &str) -> Option<String> {
        match self.regions.lock().await.get(instance) {
            Some(region) => Some(region.clone()),
            None => self.config.region.clone(),
        }
    }

    async fn run_steps(&self, image_id: &str, instance_type: &str, region: &str) -> ExecResult<String> {
        let output = self
            .attempt(
                Some(region),
                &[
                    "run-instances",
                    "--image-id",
                    image_id,
                    "--instance-type",
                    instance_type,
                    "--count",
                    "1",
                    "--query",
                    "Instances[0].InstanceId",
                    "--output",
                    "text",
                ],
            )
            .await?;
        let id = parse_instance_id(&output)?;
        debug!(instance = %id, %region, "run-instances accepted, waiting for instance");

        self.attempt(Some(region), &["wait", "instance-exists", "--instance-ids", &id])
            .await?;
        self.attempt(Some(region), &["wait", "instance-running", "--instance-ids", &id])
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl Provisioner for AwsCliProvisioner {
    async fn provision(
        &self,
        image_id: &str,
        instance_type: &str,
        region: &str,
    ) -> ExecResult<String> {
        let budget = Duration::from_secs(self.config.api_call_timeout_secs);
        let id = timeout(budget, self.run_steps(image_id, instance_type, region))
            .await
            .map_err(|_| ExecError::TimedOut {
                operation: "provision".to_string(),
                target: image_id.to_string(),
                budget,
            })??;

        self.regions
            .lock()
            .await
            .insert(id.clone(), region.to_string());
        info!(instance = %id, %region, %instance_type, "instance running");
        Ok(id)
    }
}

#[async_trait]
impl LifecycleBackend for AwsCliProvisioner {
    async fn start(&self, instance: &str) -> ExecResult<()> {
        let region = self.region_of(instance).await;
        self.attempt(region.as_deref(), &["start-instances", "--instance-ids", instance])
            .await?;
        Ok(())
    }

    async fn stop(&self, instance: &str) -> ExecResult<()> {
        let region = self.region_of(instance).await;
        self.attempt(region.as_deref(), &["stop-instances", "--instance-ids", instance])
            .await?;
        Ok(())
    }

    async fn delete(&self, instance: &str) -> ExecResult<()> {
        let region = self.region_of(instance).await;
        self.attempt(region.as_deref(), &["terminate-instances", "--instance-ids", instance])
            .await?;
        self.regions.lock().await.remove(instance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids() {
        assert_eq!(parse_instance_id("i-0abc12345def67890\n").unwrap(), "i-0abc12345def67890");
        assert_eq!(parse_instance_id("i-1234abcd").unwrap(), "i-1234abcd");
        for bad in ["", "None", "i-xyz", "An error occurred (InvalidAMIID.Malformed)"] {
            assert!(matches!(
                parse_instance_id(bad),
                Err(ExecError::MalformedOperationResult(_))
            ));
        }
    }

    #[test]
    fn timeouts_are_passed_to_the_cli() {
        let aws = AwsCliProvisioner::new(AwsCliConfig {
            profile: Some("ops".to_string()),
            connect_timeout_secs: 5,
            ..Default::default()
        });
        let args = aws.ec2_args(Some("eu-west-1"), &["stop-instances", "--instance-ids", "i-1"]);
        assert_eq!(args[..4], ["ec2", "stop-instances", "--instance-ids", "i-1"]);
        assert!(args.windows(2).any(|w| w == ["--region", "eu-west-1"]));
        assert!(args.windows(2).any(|w| w == ["--profile", "ops"]));
        assert!(args.windows(2).any(|w| w == ["--cli-connect-timeout", "5"]));
        assert!(args.windows(2).any(|w| w == ["--cli-read-timeout", "60"]));
    }

    /// Writes a stand-in `aws` script that answers the three provisioning calls.
    #[cfg(unix)]
    fn fake_aws(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("aws");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provisions_through_the_cli() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_aws(
            dir.path(),
            r#"case "$2" in
  run-instances) echo i-0123456789abcdef0 ;;
  wait) exit 0 ;;
  *) exit 1 ;;
esac"#,
        );
        let aws = AwsCliProvisioner::new(AwsCliConfig {
            program,
            ..Default::default()
        });

        let id = aws.provision("ami-1", "t3.large", "eu-west-1").await.unwrap();

        assert_eq!(id, "i-0123456789abcdef0");
        assert_eq!(aws.region_of(&id).await.as_deref(), Some("eu-west-1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_waiter_exceeds_attempt_budget() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_aws(
            dir.path(),
            r#"case "$2" in
  run-instances) echo i-0123456789abcdef0 ;;
  wait) sleep 5 ;;
esac"#,
        );
        let aws = AwsCliProvisioner::new(AwsCliConfig {
            program,
            attempt_timeout_secs: 1,
            ..Default::default()
        });

        let err = aws.provision("ami-1", "t3.large", "eu-west-1").await.unwrap_err();
        assert!(matches!(err, ExecError::TimedOut { .. }), "{err:?}");
    }
}
