use std::process;
use std::sync::Arc;

use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitplat_core::service::NutritionService;

use super::helpers::{no_neg_zero, parse_date, truncate};
use super::run_blocking;

pub(crate) async fn cmd_summary(
    service: Arc<NutritionService>,
    user_id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Grams")]
        grams: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let date = parse_date(date)?;
    let (summary, entries) = run_blocking(move || {
        let summary = service.daily_summary(user_id, date)?;
        let entries = service.meals_for_date(user_id, date)?;
        Ok((summary, entries))
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries for user {user_id} on {date}");
        process::exit(2);
    }

    let grams = |v: Option<f64>| v.map_or("-".into(), |v| format!("{v:.1}g"));
    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            meal: e.meal_type.to_string(),
            food: truncate(&e.food_name, 30),
            grams: format!("{:.0}", e.quantity_grams),
            calories: e.consumed.calories.map_or("-".into(), |v| format!("{v:.0}")),
            protein: grams(e.consumed.protein_g),
            carbs: grams(e.consumed.carbs_g),
            fat: grams(e.consumed.fat_g),
        })
        .collect();

    println!("=== {date} (user {user_id}) ===\n");
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let t = &summary.totals;
    let cal = no_neg_zero(t.calories);
    let p = no_neg_zero(t.protein_g);
    let c = no_neg_zero(t.carbs_g);
    let f = no_neg_zero(t.fat_g);
    println!("\n  TOTAL: {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");

    let meals: Vec<String> = summary
        .meals
        .iter()
        .map(|m| format!("{} x{}", m.meal_type, m.count))
        .collect();
    if !meals.is_empty() {
        println!("  MEALS: {}", meals.join(", "));
    }

    Ok(())
}
