//! Admin CLI backend.
//!
//! Drives an external administration tool (`asadmin` by default) with the
//! `create-instance`, `start-instance`, `stop-instance` and
//! `delete-instance` subcommands. The tool reports created instances only
//! as text, so the name is mined out of its output here and nowhere else.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use scalegrid_executor::{ExecError, ExecResult, LifecycleBackend};
use scalegrid_scaler::InstanceRegistry;
use scalegrid_state::{InstanceName, ScalingGroup};

use crate::process;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCliConfig {
    pub program: String,
    /// Arguments placed before every subcommand, e.g. `--user admin`.
    pub args: Vec<String>,
}

impl Default for AdminCliConfig {
    fn default() -> Self {
        Self {
            program: "asadmin".to_string(),
            args: Vec::new(),
        }
    }
}

pub struct AdminCli {
    config: AdminCliConfig,
}

impl AdminCli {
    pub fn new(config: AdminCliConfig) -> Self {
        Self { config }
    }

    async fn invoke(&self, subcommand: &str, args: Vec<String>) -> ExecResult<String> {
        let mut full = self.config.args.clone();
        full.push(subcommand.to_string());
        full.extend(args);
        process::run(&self.config.program, &full).await
    }
}

/// Arguments of `create-instance` for one instance of `group` on `node`.
pub fn create_instance_args(node: &str, group: &ScalingGroup) -> Vec<String> {
    let mut args = vec![
        "--node".to_string(),
        node.to_string(),
        "--deploymentgroup".to_string(),
        group.deployment_group_ref.clone(),
    ];
    if group.uses_custom_config() {
        args.push("--config".to_string());
        args.push(group.config_ref.clone());
    }
    args.push("--autoname=true".to_string());
    args.push("--terse=true".to_string());
    args
}

/// Extract the instance name from `create-instance` output of the form
/// "The instance, NAME, was created on host HOST".
pub fn parse_created_instance(output: &str) -> ExecResult<InstanceName> {
    let re = Regex::new(r"The instance, (.+), was created on host (\S+)")
        .map_err(|e| ExecError::MalformedOperationResult(e.to_string()))?;

    let name = re
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty());

    name.ok_or_else(|| {
        ExecError::MalformedOperationResult(format!(
            "could not determine instance name from create-instance output: {output:?}"
        ))
    })
}

#[async_trait]
impl InstanceRegistry for AdminCli {
    async fn create_instance_on(
        &self,
        node: &str,
        group: &ScalingGroup,
    ) -> ExecResult<InstanceName> {
        let output = self
            .invoke("create-instance", create_instance_args(node, group))
            .await?;
        let name = parse_created_instance(&output)?;
        info!(instance = %name, %node, group = %group.name, "instance created");
        Ok(name)
    }
}

#[async_trait]
impl LifecycleBackend for AdminCli {
    async fn start(&self, instance: &str) -> ExecResult<()> {
        self.invoke("start-instance", vec![instance.to_string()]).await?;
        Ok(())
    }

    async fn stop(&self, instance: &str) -> ExecResult<()> {
        self.invoke("stop-instance", vec![instance.to_string()]).await?;
        Ok(())
    }

    async fn delete(&self, instance: &str) -> ExecResult<()> {
        self.invoke("delete-instance", vec![instance.to_string()]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalegrid_state::ProviderConfig;

    fn group(config_ref: &str) -> ScalingGroup {
        ScalingGroup {
            name: "web".to_string(),
            config_ref: config_ref.to_string(),
            deployment_group_ref: "dg-web".to_string(),
            min_instances: 0,
            max_instances: 10,
            provider: ProviderConfig::Nodes {
                node_refs: vec!["n1".to_string()],
            },
        }
    }

    #[test]
    fn parses_terse_create_output() {
        let name = parse_created_instance("The instance, wibbles-bibbles, was created on host tiddles")
            .unwrap();
        assert_eq!(name, "wibbles-bibbles");
    }

    #[test]
    fn parses_output_with_surrounding_lines() {
        let output = "Port Assignments for server instance x:\nThe instance, web-n1-3, was created on host 10.0.0.1\nCommand create-instance executed successfully.";
        assert_eq!(parse_created_instance(output).unwrap(), "web-n1-3");
    }

    #[test]
    fn unexpected_output_is_malformed() {
        for output in ["Command create-instance executed successfully.", "", "The instance, , was created on host h"] {
            let err = parse_created_instance(output).unwrap_err();
            assert!(matches!(err, ExecError::MalformedOperationResult(_)), "{output}");
        }
    }

    #[test]
    fn default_config_is_not_passed() {
        let args = create_instance_args("n1", &group("default-config"));
        assert_eq!(
            args,
            vec![
                "--node",
                "n1",
                "--deploymentgroup",
                "dg-web",
                "--autoname=true",
                "--terse=true"
            ]
        );

        let args = create_instance_args("n1", &group("web-config"));
        assert!(args.windows(2).any(|w| w == ["--config", "web-config"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn create_goes_through_the_program() {
        // `sh -c <script> <argv0> <args...>` echoes the node back as host.
        let cli = AdminCli::new(AdminCliConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"echo "The instance, made-on-$3, was created on host $3""#.to_string(),
                "asadmin".to_string(),
            ],
        });

        let name = cli.create_instance_on("n7", &group("default-config")).await.unwrap();
        assert_eq!(name, "made-on-n7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_lifecycle_command_is_a_backend_error() {
        let cli = AdminCli::new(AdminCliConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo \"$1: no such instance $2\" >&2; exit 1".to_string(),
                "asadmin".to_string(),
            ],
        });

        let err = cli.stop("ghost").await.unwrap_err();
        let ExecError::Backend(cause) = err else {
            panic!("expected backend error");
        };
        assert!(cause.contains("stop-instance: no such instance ghost"), "{cause}");
    }
}
