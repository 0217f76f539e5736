use anyhow::Result;
use recollect::config::RecollectConfig;
use recollect::memory::persona::{PersonaResolver, Resolution};
use recollect::store::tone::SqliteToneRules;
use std::sync::Arc;

/// Store instructions for `identity`, or the default profile when `None`.
pub async fn set(config: &RecollectConfig, identity: Option<&str>, instruction: &str) -> Result<()> {
    anyhow::ensure!(!instruction.trim().is_empty(), "instruction must not be empty");
    let rules = SqliteToneRules::new(super::open_shared(config)?);

    match identity {
        Some(identity) => {
            rules.set_for_identity(identity, instruction).await?;
            println!("Persona set for {identity}.");
        }
        None => {
            rules.set_default(instruction).await?;
            println!("Default persona set.");
        }
    }
    Ok(())
}

pub async fn show(config: &RecollectConfig, identity: &str) -> Result<()> {
    let rules = Arc::new(SqliteToneRules::new(super::open_shared(config)?));
    let resolver = PersonaResolver::new(rules, config.persona.fallback_text.clone());

    match resolver.resolve(identity).await {
        Resolution::Resolved {
            instruction,
            source,
        } => {
            println!("Source: {source:?}");
            println!("{instruction}");
        }
        Resolution::Unresolved { reason } => anyhow::bail!("persona lookup failed: {reason}"),
    }
    Ok(())
}
