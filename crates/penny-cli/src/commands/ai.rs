//! AI assist commands

use anyhow::{Context, Result};
use penny_core::{
    AIAssistEngine, AssistConfig, Database, GatewayClient, InteractionPayload, ModelGateway,
    SummaryView,
};
use tracing::{debug, warn};

use super::{transactions::parse_amount, truncate};

pub async fn cmd_classify(
    engine: &AIAssistEngine,
    user_id: &str,
    description: &str,
    amount: &str,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let outcome = engine
        .classify_transaction(user_id, description, amount)
        .await?;

    if outcome.is_degraded() {
        warn!(user_id, "Classification degraded, using fallback category");
        println!("⚠️  AI unavailable, using fallback category");
    }
    println!("🏷️  {}", outcome.value());
    Ok(())
}

pub async fn cmd_summarize(
    db: &Database,
    engine: &AIAssistEngine,
    user_id: &str,
    year: i32,
    month: u32,
    json: bool,
) -> Result<()> {
    let result = engine
        .summarize_stored_month(db, user_id, year, month)
        .await?;

    if json {
        let view = SummaryView::from(&result);
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let metrics = &result.metrics;
    println!();
    println!("📊 Summary for {}", metrics.period);
    println!("   ─────────────────────────────");
    println!("   Income:   ${:.2}", metrics.total_income);
    println!("   Expenses: ${:.2}", metrics.total_expenses);
    println!("   Savings:  ${:.2}", metrics.savings);

    if !metrics.expenses_by_category.is_empty() {
        println!();
        for (category, amount) in &metrics.expenses_by_category {
            println!("   {:<16} ${:.2}", category, amount);
        }
    }

    println!();
    if result.is_degraded() {
        warn!(user_id, period = %metrics.period, "Month summary degraded");
        println!("⚠️  {}", result.summary());
    } else {
        println!("{}", result.summary());
    }
    Ok(())
}

pub fn cmd_interactions(db: &Database, user_id: &str, limit: i64) -> Result<()> {
    let records = db.list_interactions(user_id, limit.max(1))?;

    if records.is_empty() {
        println!("No AI interactions recorded yet.");
        return Ok(());
    }

    println!();
    println!("🧾 AI Interactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for record in records {
        let status = if record.payload.is_success() { "✓" } else { "✗" };
        let detail = match &record.payload {
            InteractionPayload::Classification { input, .. } => {
                truncate(&input.description, 30)
            }
            InteractionPayload::MonthSummary { input, .. } => {
                format!("{}/{}", input.month, input.year)
            }
        };

        println!(
            "   {} {} │ {:<14} │ {:>6}ms │ {}",
            status,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.kind().as_str(),
            record.latency_ms,
            detail
        );
    }

    Ok(())
}

pub async fn cmd_health() -> Result<()> {
    let config = AssistConfig::load().context("Failed to load assist config")?;
    let gateway = GatewayClient::from_config(&config.backend);
    debug!(
        backend = gateway.backend_name(),
        configured = gateway.is_configured(),
        "Checking AI backend"
    );

    println!("🤖 AI backend: {}", gateway.backend_name());
    println!("   Model: {}", gateway.model());

    if !gateway.is_configured() {
        println!("   ⚠️  No host configured, AI features will return fallback results");
        return Ok(());
    }

    println!("   Host: {}", gateway.host());
    if gateway.health_check().await {
        println!("   ✅ Connected");
    } else {
        warn!(host = gateway.host(), "AI backend health check failed");
        println!("   ❌ Not responding");
    }
    Ok(())
}
