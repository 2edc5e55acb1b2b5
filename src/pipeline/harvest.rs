//! External diagram harvesting: find diagram references in extracted text.
//!
//! Design docs often point at their diagrams instead of embedding them: a
//! PNG on a wiki, a draw.io link, a mermaid.live share link, or an inline
//! ```` ```mermaid ```` block. [`harvest`] collects all four kinds (pure,
//! first-seen order, duplicates kept) and [`resolve_external`] turns them
//! into image bytes and Mermaid sources.

use crate::fetch::HttpFetch;
use crate::model::DiagramLinks;
use crate::pipeline::extract;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

/// Placeholder for draw.io links; conversion is not performed.
pub const DRAWIO_SENTINEL: &str = "[draw.io to mermaid conversion not implemented]";

/// Placeholder for mermaid.live links whose code cannot be recovered.
pub const MERMAID_URL_SENTINEL: &str = "[Could not extract mermaid code from URL]";

// ── Patterns ─────────────────────────────────────────────────────────────

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s]+?\.(?:png|jpg|jpeg|gif)").expect("valid regex")
});

static DRAWIO_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]*draw\.io[^\s]*").expect("valid regex"));

static MERMAID_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://mermaid\.live[^\s]*").expect("valid regex"));

static MERMAID_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid[ \t]*\r?\n(.*?)```").expect("valid regex"));

/// Collect every diagram reference in `text`.
pub fn harvest(text: &str) -> DiagramLinks {
    let all = |re: &Regex| -> Vec<String> {
        re.find_iter(text).map(|m| m.as_str().to_string()).collect()
    };

    let links = DiagramLinks {
        image_urls: all(&IMAGE_URL),
        drawio_urls: all(&DRAWIO_URL),
        mermaid_urls: all(&MERMAID_URL),
        mermaid_blocks: MERMAID_BLOCK
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .collect(),
    };

    debug!(
        "Harvested {} image URLs, {} draw.io, {} mermaid.live, {} mermaid blocks",
        links.image_urls.len(),
        links.drawio_urls.len(),
        links.mermaid_urls.len(),
        links.mermaid_blocks.len()
    );
    links
}

/// Recover Mermaid source from a mermaid.live share link.
///
/// The fragment wins when present and non-empty; otherwise the `graph` query
/// parameter. Both are percent-decoded. Anything else yields
/// [`MERMAID_URL_SENTINEL`].
pub fn mermaid_from_live_url(raw: &str) -> String {
    let Ok(parsed) = url::Url::parse(raw) else {
        warn!("Unparseable mermaid.live URL: {}", raw);
        return MERMAID_URL_SENTINEL.to_string();
    };

    let encoded = match parsed.fragment().filter(|f| !f.is_empty()) {
        Some(fragment) => fragment.to_string(),
        None => match parsed.query_pairs().find(|(k, _)| k == "graph") {
            Some((_, v)) => v.into_owned(),
            None => return MERMAID_URL_SENTINEL.to_string(),
        },
    };

    match urlencoding::decode(&encoded) {
        Ok(code) if !code.trim().is_empty() => code.into_owned(),
        Ok(_) => MERMAID_URL_SENTINEL.to_string(),
        Err(e) => {
            warn!("Could not percent-decode mermaid.live URL {}: {}", raw, e);
            MERMAID_URL_SENTINEL.to_string()
        }
    }
}

/// Images and diagram sources obtained from harvested links.
#[derive(Debug, Clone, Default)]
pub struct ExternalDiagrams {
    /// Bytes of every image URL that could be fetched, in link order.
    pub images: Vec<Vec<u8>>,
    /// draw.io sentinels, then mermaid.live codes, then inline blocks.
    pub diagrams: Vec<String>,
}

/// Fetch harvested images and decode harvested diagram links.
pub async fn resolve_external(links: &DiagramLinks, fetcher: &dyn HttpFetch) -> ExternalDiagrams {
    let mut images = Vec::new();
    for url in &links.image_urls {
        match fetcher.get(url).await {
            Some(bytes) if !bytes.is_empty() => images.push(bytes),
            _ => debug!("Dropping unfetchable image URL {}", url),
        }
    }

    let diagrams = links
        .drawio_urls
        .iter()
        .map(|_| DRAWIO_SENTINEL.to_string())
        .chain(links.mermaid_urls.iter().map(|u| mermaid_from_live_url(u)))
        .chain(links.mermaid_blocks.iter().map(|b| b.trim().to_string()))
        .collect();

    ExternalDiagrams { images, diagrams }
}

/// Everything diagram-related in one source file.
///
/// Images embedded in the file come first, followed by fetched URL images.
/// `text` is the already-extracted text; when `None` it is extracted here.
pub async fn process_document_for_diagrams(
    bytes: &[u8],
    name: &str,
    text: Option<&str>,
    fetcher: &dyn HttpFetch,
) -> ExternalDiagrams {
    let mut images = extract::extract_images(bytes, name).await;

    let owned;
    let text = match text {
        Some(t) => t,
        None => {
            owned = extract::extract_text(bytes, name).await.into_text();
            owned.as_str()
        }
    };

    let links = harvest(text);
    let external = resolve_external(&links, fetcher).await;
    images.extend(external.images);

    info!(
        "{}: {} images, {} external diagrams",
        name,
        images.len(),
        external.diagrams.len()
    );

    ExternalDiagrams {
        images,
        diagrams: external.diagrams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl HttpFetch for MapFetcher {
        async fn get(&self, url: &str) -> Option<Vec<u8>> {
            self.0.get(url).cloned()
        }
    }

    #[test]
    fn harvests_image_urls_in_order_with_duplicates() {
        let text = "see https://x.io/a.png and http://y.io/b.jpeg then https://x.io/a.png";
        let links = harvest(text);
        assert_eq!(
            links.image_urls,
            vec!["https://x.io/a.png", "http://y.io/b.jpeg", "https://x.io/a.png"]
        );
    }

    #[test]
    fn image_url_match_is_non_greedy() {
        let links = harvest("https://x.io/a.png?size=large.gif");
        assert_eq!(links.image_urls, vec!["https://x.io/a.png"]);
    }

    #[test]
    fn harvests_drawio_and_mermaid_urls() {
        let text = "arch: https://app.diagrams.net/x https://viewer.draw.io/#Hfoo\nflow: https://mermaid.live/edit#pako:abc";
        let links = harvest(text);
        assert_eq!(links.drawio_urls, vec!["https://viewer.draw.io/#Hfoo"]);
        assert_eq!(links.mermaid_urls, vec!["https://mermaid.live/edit#pako:abc"]);
    }

    #[test]
    fn harvests_mermaid_blocks_trimmed() {
        let text = "intro\n```mermaid\n  graph TD\n  A-->B\n```\nmid\n```mermaid\nC-->D\n```\n";
        let links = harvest(text);
        assert_eq!(links.mermaid_blocks, vec!["graph TD\n  A-->B", "C-->D"]);
    }

    #[test]
    fn plain_text_has_no_links() {
        assert!(harvest("nothing to see here").is_empty());
    }

    #[test]
    fn live_url_fragment_is_decoded() {
        assert_eq!(
            mermaid_from_live_url("https://mermaid.live/edit#pako:eJyrVkrOT0lVslIqLilKTc4vLclMzStRqgUAbdsIqQ"),
            "pako:eJyrVkrOT0lVslIqLilKTc4vLclMzStRqgUAbdsIqQ"
        );
        assert_eq!(
            mermaid_from_live_url("https://mermaid.live/view#graph%20TD%3B%20A--%3EB"),
            "graph TD; A-->B"
        );
    }

    #[test]
    fn live_url_graph_query_is_used_without_fragment() {
        assert_eq!(
            mermaid_from_live_url("https://mermaid.live/view?graph=graph%20LR%3BX--%3EY"),
            "graph LR;X-->Y"
        );
    }

    #[test]
    fn live_url_without_code_is_sentinel() {
        assert_eq!(mermaid_from_live_url("https://mermaid.live/edit"), MERMAID_URL_SENTINEL);
        assert_eq!(mermaid_from_live_url("https://mermaid.live/edit#"), MERMAID_URL_SENTINEL);
        assert_eq!(mermaid_from_live_url("https://mermaid.live/edit#%FF"), MERMAID_URL_SENTINEL);
    }

    #[tokio::test]
    async fn resolve_drops_unfetchable_images_and_orders_diagrams() {
        let mut served = HashMap::new();
        served.insert("https://x.io/ok.png".to_string(), vec![1, 2, 3]);
        let fetcher = MapFetcher(served);

        let links = DiagramLinks {
            image_urls: vec!["https://x.io/ok.png".into(), "https://x.io/404.png".into()],
            drawio_urls: vec!["https://draw.io/a".into()],
            mermaid_urls: vec!["https://mermaid.live/edit#A--%3EB".into()],
            mermaid_blocks: vec![" C-->D ".into()],
        };
        let ext = resolve_external(&links, &fetcher).await;
        assert_eq!(ext.images, vec![vec![1, 2, 3]]);
        assert_eq!(ext.diagrams, vec![DRAWIO_SENTINEL, "A-->B", "C-->D"]);
    }

    #[tokio::test]
    async fn process_document_appends_url_images_after_embedded() {
        let mut served = HashMap::new();
        served.insert("https://x.io/d.png".to_string(), vec![9]);
        let fetcher = MapFetcher(served);

        let png = vec![0x89, b'P', b'N', b'G'];
        let ext = process_document_for_diagrams(&png, "shot.png", None, &fetcher).await;
        assert_eq!(ext.images, vec![png.clone()]);

        let text = b"diagram: https://x.io/d.png\n```mermaid\nA-->B\n```\n";
        let ext = process_document_for_diagrams(text, "notes.md", None, &fetcher).await;
        assert_eq!(ext.images, vec![vec![9]]);
        assert_eq!(ext.diagrams, vec!["A-->B"]);
    }
}
