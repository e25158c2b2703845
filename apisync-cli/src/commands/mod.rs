pub mod export;
pub mod import;
pub mod inspect;
pub mod link;

pub use export::run_export;
pub use import::run_import;
pub use inspect::run_inspect;
pub use link::run_link;

use anyhow::{Context, Result};
use apisync::{Config, ManagementClient, RunSummary, ServiceCoordinates};

use crate::ServiceArgs;

/// Build a management client for the service named on the command line.
pub(crate) fn connect(config: &Config, args: &ServiceArgs) -> Result<ManagementClient> {
    let mut management = config.management.clone();
    if let Some(endpoint) = &args.endpoint {
        management.endpoint = endpoint.clone();
    }
    let coordinates =
        ServiceCoordinates::new(&args.subscription, &args.resource_group, &args.service);
    ManagementClient::new(&management, &coordinates, &args.token)
        .with_context(|| format!("Cannot create management client for {}", coordinates))
}

pub(crate) fn print_summary(title: &str, summary: &RunSummary) {
    let total = summary.total();
    println!();
    println!("{}", title);
    println!("--------------------------------------------------------------------------------");
    print!("{}", summary);
    println!("--------------------------------------------------------------------------------");
    if summary.has_warnings() {
        println!(
            "Completed with warnings: {} applied, {} skipped, {} failed",
            total.applied, total.skipped, total.failed
        );
    } else {
        println!(
            "Completed: {} applied, {} skipped",
            total.applied, total.skipped
        );
    }
}
