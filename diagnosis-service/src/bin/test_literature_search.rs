use diagnostic_flow::{EuropePmcClient, Keywords, LiteratureSource};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let keywords = Keywords::Many(vec![
        "Meningitis".to_string(),
        "complete blood count".to_string(),
    ]);
    let Some(query) = keywords.to_query() else {
        error!("No keywords to search for");
        return Ok(());
    };

    info!("Searching for articles matching: {}", query);

    let client = EuropePmcClient::new(Duration::from_secs(30))?;
    let articles = match client.search(&query, 3).await {
        Ok(articles) => articles,
        Err(e) => {
            error!("Literature search failed: {}", e);
            return Ok(());
        }
    };

    if articles.is_empty() {
        info!("No articles found.");
    }

    for (i, article) in articles.iter().enumerate() {
        info!("\nArticle {}:", i + 1);
        info!("  Title: {}", article.title.as_deref().unwrap_or("-"));
        info!(
            "  Abstract: {}...",
            article
                .abstract_text
                .as_deref()
                .unwrap_or("")
                .chars()
                .take(200)
                .collect::<String>()
        );
        info!("  DOI: {}", article.doi.as_deref().unwrap_or("-"));
        info!("  URLs: {:?}", article.url);
    }

    Ok(())
}
