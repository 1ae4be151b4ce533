use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::{Value, json};
use reqwest::Client;
use tracing::{error, info};
use crate::actions::Publisher;

/// sites.json 中的单个站点配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    pub url: String,
    pub user: String,
    pub app_password: String,
}

#[derive(Debug)]
pub struct WordPressPublisher {
    client: Client,
    api_url: String,
    user: String,
    password: String,
}

impl WordPressPublisher {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: format!("{}/wp-json/wp/v2", site.url.trim_end_matches('/')),
            user: site.user.clone(),
            password: site.app_password.clone(),
        }
    }

    pub fn posts_url(&self) -> String {
        format!("{}/posts", self.api_url)
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn post_draft(&self, title: &str, content: &str, slug: &str) -> Option<String> {
        let body = json!({
            "title": title,
            "content": content,
            "status": "draft",
            "slug": slug,
        });

        let response = match self
            .client
            .post(self.posts_url())
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Error posting to WP: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Error posting to WP. Response: {}", text);
            return None;
        }

        match response.json::<Value>().await {
            Ok(data) => {
                let link = data.get("link").and_then(|l| l.as_str()).map(|s| s.to_string());
                info!(link = ?link, "Draft created");
                link
            }
            Err(e) => {
                error!("Invalid WP response: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posts_url_strips_trailing_slash() {
        let site = SiteConfig {
            url: "https://example.com/".to_string(),
            user: "u".to_string(),
            app_password: "p".to_string(),
        };
        let publisher = WordPressPublisher::new(&site);
        assert_eq!(publisher.posts_url(), "https://example.com/wp-json/wp/v2/posts");
    }
}
