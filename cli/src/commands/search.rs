use std::process;
use std::sync::Arc;

use anyhow::Result;

use fitplat_core::models::FoodResult;
use fitplat_core::service::{FoodLookupProvider, NutritionService};

use super::helpers::print_food_table;
use super::run_blocking;

pub(crate) async fn cmd_search(
    service: Arc<NutritionService>,
    provider: Arc<dyn FoodLookupProvider>,
    query: String,
    limit: usize,
    json: bool,
) -> Result<()> {
    let response =
        run_blocking(move || Ok(service.search_foods(provider.as_ref(), &query, limit)?)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    if response.foods.is_empty() {
        if !json {
            eprintln!("No results found for '{}'", response.query);
        }
        process::exit(2);
    }
    if json {
        return Ok(());
    }

    print_food_table(&response.foods);
    eprintln!(
        "{} local, {} newly cached, {} total",
        response.local_results, response.cached_new, response.total_results
    );
    Ok(())
}

fn print_food(food: &FoodResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(food)?);
    } else {
        print_food_table(std::slice::from_ref(food));
    }
    Ok(())
}

pub(crate) async fn cmd_barcode(
    service: Arc<NutritionService>,
    provider: Arc<dyn FoodLookupProvider>,
    code: String,
    json: bool,
) -> Result<()> {
    let food = run_blocking(move || Ok(service.get_by_barcode(provider.as_ref(), &code)?)).await?;
    print_food(&food, json)
}

pub(crate) async fn cmd_cache(
    service: Arc<NutritionService>,
    provider: Arc<dyn FoodLookupProvider>,
    code: String,
    json: bool,
) -> Result<()> {
    let food =
        run_blocking(move || Ok(service.cache_from_remote(provider.as_ref(), &code)?)).await?;
    if !json {
        eprintln!("Cached '{}'", food.name);
    }
    print_food(&food, json)
}
