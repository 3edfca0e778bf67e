use std::process::Command;

use anyhow::{Context, Result};

const COMMON_FEATURE_TIERS: &[&str] = &["foundation", "runtime"];

/// Check that each `crmsync-common` feature tier compiles on its own.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} crmsync-common feature tiers...", COMMON_FEATURE_TIERS.len());

    for (index, tier) in COMMON_FEATURE_TIERS.iter().enumerate() {
        println!(
            "\n[{}/{}] cargo check -p crmsync-common --no-default-features --features {tier}",
            index + 1,
            COMMON_FEATURE_TIERS.len()
        );

        let status = Command::new("cargo")
            .args(["check", "-p", "crmsync-common", "--no-default-features", "--features", tier])
            .status()
            .with_context(|| format!("Failed to run cargo check for '{tier}'"))?;

        if !status.success() {
            anyhow::bail!("Feature tier '{tier}' failed to compile");
        }

        println!("✅ Tier '{tier}' compiled successfully");
    }

    println!("\n✅ All {} feature tiers compile successfully!", COMMON_FEATURE_TIERS.len());

    Ok(())
}
