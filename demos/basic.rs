use std::time::Duration;

use cast_http::{BackoffStrategy, CastClient, RetryHook};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    stargazers_count: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = CastClient::new("https://api.github.com");

    let reply = client
        .get("/repos/{owner}/{repo}")
        .path_param("owner", "rust-lang")
        .path_param("repo", "rust")
        .header(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("cast-http-demo"),
        )
        .timeout(Duration::from_secs(3))
        .retry(3)
        .backoff(BackoffStrategy::full_jitter(
            Duration::from_millis(200),
            Duration::from_secs(2),
        ))
        .retry_hook(RetryHook::Transient)
        .send()
        .await?;

    let repo: Repo = reply.decode_json()?;
    println!(
        "{} has {} stars ({} attempt(s), {:?})",
        repo.full_name,
        repo.stargazers_count,
        reply.attempts(),
        reply.cost()
    );

    Ok(())
}
