//! Topic index (sitemap) parsing.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use storyfeed_shared::Topic;

use crate::dom::{non_empty_text, resolve, selector};

static TOPIC_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[class*="TopicNameLink"]"#));

/// Extract every topic link from the index page, in document order.
///
/// Links without a name or `href` are dropped. Repeated URLs on the same page
/// are reported once.
pub fn parse_topic_index(html: &str, base: &Url) -> Vec<Topic> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for link in doc.select(&TOPIC_LINK) {
        let Some(href) = link.value().attr("href") else {
            debug!("topic link without href, skipping");
            continue;
        };
        let Some(url) = resolve(base, href) else {
            debug!(href, "unresolvable topic href, skipping");
            continue;
        };
        let Some(name) = non_empty_text(link) else {
            debug!(%url, "topic link without a name, skipping");
            continue;
        };
        if seen.insert(url.clone()) {
            topics.push(Topic { name, url });
        }
    }

    topics
}
