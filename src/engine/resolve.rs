use std::collections::HashSet;

use tracing::warn;

use super::citations::CitationMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub url_lists: Vec<Vec<String>>,
    pub unknown_tokens: Vec<String>,
}

pub fn resolve_urls(token_lists: &[Vec<String>], map: &CitationMap) -> Resolution {
    let mut resolution = Resolution {
        url_lists: Vec::with_capacity(token_lists.len()),
        ..Resolution::default()
    };

    for tokens in token_lists {
        let mut seen = HashSet::<&str>::new();
        let mut urls = Vec::new();

        for token in tokens {
            let Some(token_urls) = map.urls_for(token) else {
                warn!(token = %token, "token missing from citation map");
                resolution.unknown_tokens.push(token.clone());
                continue;
            };

            for url in token_urls {
                if seen.insert(url.as_str()) {
                    urls.push(url.clone());
                }
            }
        }

        resolution.url_lists.push(urls);
    }

    resolution
}
