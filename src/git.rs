use anyhow::{Context, Result};
use tracing::debug;

async fn run_git(args: &[&str]) -> Result<String> {
    debug!(args = %args.join(" "), "running git");
    let output = tokio::process::Command::new("git")
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub async fn current_branch() -> Result<String> {
    run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
}

pub async fn checkout_new_branch(name: &str, base: &str) -> Result<()> {
    run_git(&["checkout", "-b", name, base]).await?;
    Ok(())
}
