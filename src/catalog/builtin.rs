// src/catalog/builtin.rs

//! Demo experiments used when the config file defines none.

use chrono::Utc;
use serde_json::{Map, Value, json};

use super::{ExperimentConfig, ExperimentDefinition};

pub fn experiments() -> Vec<ExperimentDefinition> {
    vec![
        definition(
            "bank-portal-migration",
            "Bank Portal Migration Strategy",
            "Test interventions to encourage business customers to migrate from old to new portal",
            "Customer Migration",
            &["banking", "migration", "b2b"],
            ExperimentConfig {
                name: "Portal Migration A/B Test".to_string(),
                description: "Compare different intervention strategies".to_string(),
                parameters: object(json!({
                    "segments": ["small_business", "medium_business", "enterprise"],
                    "interventions": ["control", "email_campaign", "personal_outreach", "incentive_based"],
                    "duration_days": 30,
                    "sample_size": 2500
                })),
                estimated_duration: Some(15),
            },
        ),
        definition(
            "loan-approval-optimization",
            "Loan Approval Process Optimization",
            "Optimize loan approval rates while maintaining risk standards",
            "Risk Management",
            &["loans", "risk", "optimization"],
            ExperimentConfig {
                name: "Loan Approval ML Model Test".to_string(),
                description: "Test new ML model against current approval process".to_string(),
                parameters: object(json!({
                    "model_versions": ["current", "ml_v1", "ml_v2"],
                    "risk_categories": ["low", "medium", "high"],
                    "test_period_days": 60,
                    "sample_size": 5000
                })),
                estimated_duration: Some(20),
            },
        ),
        definition(
            "customer-churn-prediction",
            "Customer Churn Prevention",
            "Identify and prevent high-value customer churn",
            "Customer Retention",
            &["churn", "retention", "predictive"],
            ExperimentConfig {
                name: "Churn Prevention Strategies".to_string(),
                description: "Test different retention strategies for at-risk customers".to_string(),
                parameters: object(json!({
                    "strategies": ["control", "proactive_support", "loyalty_rewards", "service_upgrade"],
                    "customer_tiers": ["bronze", "silver", "gold", "platinum"],
                    "intervention_timing": ["30_days", "60_days", "90_days"],
                    "sample_size": 3000
                })),
                estimated_duration: Some(25),
            },
        ),
    ]
}

fn definition(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    tags: &[&str],
    config: ExperimentConfig,
) -> ExperimentDefinition {
    ExperimentDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        config,
        created_at: Utc::now(),
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
