use std::process::ExitCode;

use zato_quickstart::bootstrapper;
use zato_quickstart::services::GateOutcome;

#[tokio::main]
async fn main() -> ExitCode {
    match bootstrapper::run().await {
        Ok(GateOutcome::Provisioned(report)) => {
            tracing::info!(
                "Provisioned: {} step(s) applied, {} already in place",
                report.applied().len(),
                report.results.len() - report.applied().len()
            );
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.step() {
                Some(step) => tracing::error!("Quickstart failed at step {}: {}", step, e),
                None => tracing::error!("Quickstart failed: {}", e),
            }
            ExitCode::from(e.exit_code())
        }
    }
}
