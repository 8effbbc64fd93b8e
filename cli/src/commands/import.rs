use std::sync::Arc;

use anyhow::Result;

use fitplat_core::models::ImportReport;
use fitplat_core::service::{FoodLookupProvider, NutritionService};

use super::run_blocking;

fn print_report(label: &str, report: &ImportReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{label} import complete.\n");
        println!("  Imported: {}", report.imported);
        println!("  Skipped:  {}", report.skipped);
        if report.failed > 0 {
            println!("  Failed:   {}", report.failed);
        }
    }
    Ok(())
}

pub(crate) async fn cmd_import_common(service: Arc<NutritionService>, json: bool) -> Result<()> {
    let report = run_blocking(move || service.import_common_foods()).await?;
    print_report("Common foods", &report, json)
}

pub(crate) async fn cmd_import_quick_start(
    service: Arc<NutritionService>,
    provider: Arc<dyn FoodLookupProvider>,
    json: bool,
) -> Result<()> {
    let report = run_blocking(move || service.import_quick_start(provider.as_ref())).await?;
    print_report("Quick-start", &report, json)
}
