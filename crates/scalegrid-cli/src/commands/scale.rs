use std::process::ExitCode;

use scalegrid_scaler::{ScaleReport, Scaler};

use super::wants_json;

pub async fn up(scaler: &Scaler, group: &str, quantity: u32, format: &str) -> anyhow::Result<ExitCode> {
    let report = scaler.scale_up(group, quantity).await;
    emit(&report, format)
}

pub async fn down(scaler: &Scaler, group: &str, quantity: u32, format: &str) -> anyhow::Result<ExitCode> {
    let report = scaler.scale_down(group, quantity).await;
    emit(&report, format)
}

fn emit(report: &ScaleReport, format: &str) -> anyhow::Result<ExitCode> {
    if wants_json(format) {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render(report));
    }
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render(report: &ScaleReport) -> String {
    let mut out = String::new();
    let status = if report.success { "OK" } else { "FAILED" };
    out.push_str(&format!(
        "{} {} [{}]: {}\n",
        report.direction.label(),
        report.group,
        status,
        report.message
    ));
    for instance in &report.instances {
        out.push_str(&format!("  + {instance}\n"));
    }
    for cause in &report.failure_causes {
        out.push_str(&format!("  ! {cause}\n"));
    }
    out
}
