//! Testing utilities: a mock page fetcher and listing fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use posterboard_core::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! let html = fixtures::linkomanija_listing(&[(1, "First"), (2, "Second")]);
//! fetcher.add_page(&fixtures::linkomanija_detail_url(1), &fixtures::detail_page("/p/1.jpg"));
//! ```

mod mock_fetcher;

pub use mock_fetcher::MockFetcher;

/// Listing and detail page fixtures.
pub mod fixtures {
    use reqwest::Url;

    pub const LINKOMANIJA_BROWSE_URL: &str = "https://www.linkomanija.net/browse.php";
    pub const TORRENT_LT_LISTING_URL: &str = "https://www.torrent.lt/torrents";

    pub fn linkomanija_base() -> Option<Url> {
        Url::parse(LINKOMANIJA_BROWSE_URL).ok()
    }

    pub fn torrent_lt_base() -> Option<Url> {
        Url::parse(TORRENT_LT_LISTING_URL).ok()
    }

    /// Absolute detail URL of a linkomanija torrent id.
    pub fn linkomanija_detail_url(id: u32) -> String {
        format!("https://www.linkomanija.net/details.php?id={}", id)
    }

    /// One linkomanija browse row with size / seeds / leeches in the
    /// default column positions.
    pub fn linkomanija_row(id: u32, title: &str) -> String {
        format!(
            r#"<tr><td><img src="/pic/cat_movies.png"></td><td><a href="details.php?id={id}"><b>{title}</b></a></td><td><a href="download.php?id={id}">DL</a></td><td>1</td><td>2</td><td>{id}.5 GB</td><td>{seeds}</td><td>1</td></tr>"#,
            id = id,
            title = title,
            seeds = 10 + id,
        )
    }

    /// A linkomanija browse page listing `rows` (id, title).
    pub fn linkomanija_listing(rows: &[(u32, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(id, title)| linkomanija_row(*id, title))
            .collect();
        format!(
            r#"<html><head><title>Browse</title></head><body><div id="content"><form action="browse.php" method="get"><table id="torrents"><tr><td>Type</td><td>Name</td><td></td><td></td><td>Files</td><td>Size</td><td>S</td><td>L</td></tr>{}</table></form></div></body></html>"#,
            body
        )
    }

    /// A torrent.lt listing; each row is (id, title, inline poster).
    pub fn torrent_lt_listing(rows: &[(u32, &str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(id, title, poster)| {
                format!(
                    r#"<tr><td>Movies</td><td class="torrent-name_cell"><a href="/torrent/{id}" data-poster-preview="{poster}">{title}</a></td><td><a href="/download/{id}.torrent">DL</a></td><td>2024-01-01</td><td>1</td><td>700 MB</td><td>5</td><td>0</td></tr>"#,
                    id = id,
                    title = title,
                    poster = poster,
                )
            })
            .collect();
        format!(
            r#"<html><body><table class="torrents"><tr><th>Cat</th><th>Name</th></tr>{}</table></body></html>"#,
            body
        )
    }

    /// A detail page whose description holds one poster image.
    pub fn detail_page(poster_src: &str) -> String {
        format!(
            r#"<html><body><div id="content"><img src="/pic/arrow_left.png"><div class="descr_text"><img src="{}" width="300"></div></div></body></html>"#,
            poster_src
        )
    }

    /// A detail page with only decorative images.
    pub fn detail_page_without_poster() -> String {
        r#"<html><body><div id="content"><img src="/pic/rss.png"><img src="/pic/stars/5.gif"></div></body></html>"#.to_string()
    }
}
