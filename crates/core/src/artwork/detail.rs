//! Poster search inside a fetched detail page.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// Path infixes of decorative images (category icons, arrows, buttons,
/// rating stars, feed and social icons).
pub const DENYLISTED_INFIXES: [&str; 7] = [
    "cat_", "arrow", "button", "stars", "rss", "facebook", "twitter",
];

/// Images with an explicit width or height below this are icons.
pub const MIN_DIMENSION: u32 = 50;

static DESCRIPTION_IMAGES: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".descr_text img").unwrap());
static CONTENT_IMAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("#content img").unwrap());

/// Leading-integer parse of a dimension attribute; anything unparsable is 0.
fn parse_dimension(value: Option<&str>) -> u32 {
    let digits: String = value
        .unwrap_or("")
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn is_icon_size(value: Option<&str>) -> bool {
    let n = parse_dimension(value);
    n > 0 && n < MIN_DIMENSION
}

fn qualifies(img: &ElementRef<'_>) -> Option<String> {
    let src = img.value().attr("src").unwrap_or("");
    if src.is_empty() {
        return None;
    }

    let lower = src.to_lowercase();
    if DENYLISTED_INFIXES.iter().any(|infix| lower.contains(infix)) {
        return None;
    }

    if is_icon_size(img.value().attr("width")) || is_icon_size(img.value().attr("height")) {
        return None;
    }

    Some(src.to_string())
}

/// Find the representative image of a detail page.
///
/// The description region is searched first; the whole content region only
/// when the description has no images at all. Returns the raw `src` value.
pub fn find_poster(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let mut candidates: Vec<ElementRef<'_>> = document.select(&DESCRIPTION_IMAGES).collect();
    if candidates.is_empty() {
        candidates = document.select(&CONTENT_IMAGES).collect();
    }

    candidates.iter().find_map(qualifies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(images: &str) -> String {
        format!(r#"<html><body><div id="content">{}</div></body></html>"#, images)
    }

    #[test]
    fn test_denylisted_decoys_are_skipped_in_any_position() {
        let decoys = [
            r#"<img src="/pic/cat_movies.gif">"#,
            r#"<img src="/pic/arrow_up.png">"#,
            r#"<img src="/pic/BUTTON_thanks.png">"#,
            r#"<img src="/pic/stars/4.gif">"#,
            r#"<img src="/pic/rss.png">"#,
            r#"<img src="https://x/facebook.png">"#,
            r#"<img src="https://x/twitter.png">"#,
        ];
        let real = r#"<img src="https://img.example/poster.jpg">"#;

        for position in 0..=decoys.len() {
            let mut images: Vec<&str> = decoys.to_vec();
            images.insert(position, real);
            let html = content(&images.concat());
            assert_eq!(
                find_poster(&html).as_deref(),
                Some("https://img.example/poster.jpg"),
                "position {}",
                position
            );
        }
    }

    #[test]
    fn test_small_explicit_dimensions_are_skipped() {
        let html = content(
            r#"<img src="/a.png" width="30"><img src="/b.png" height="49"><img src="/c.png" width="50">"#,
        );
        assert_eq!(find_poster(&html).as_deref(), Some("/c.png"));
    }

    #[test]
    fn test_zero_or_absent_dimensions_are_eligible() {
        assert_eq!(
            find_poster(&content(r#"<img src="/zero.png" width="0" height="0">"#)).as_deref(),
            Some("/zero.png")
        );
        assert_eq!(
            find_poster(&content(r#"<img src="/bare.png">"#)).as_deref(),
            Some("/bare.png")
        );
        assert_eq!(
            find_poster(&content(r#"<img src="/junk.png" width="auto">"#)).as_deref(),
            Some("/junk.png")
        );
    }

    #[test]
    fn test_dimension_with_unit_suffix() {
        assert_eq!(parse_dimension(Some("30px")), 30);
        assert_eq!(parse_dimension(Some(" 300")), 300);
        assert_eq!(parse_dimension(Some("-5")), 0);
        assert_eq!(parse_dimension(None), 0);
    }

    #[test]
    fn test_description_region_has_priority() {
        let html = r#"<div id="content">
            <img src="/content.jpg">
            <div class="descr_text"><img src="/descr.jpg"></div>
        </div>"#;
        assert_eq!(find_poster(html).as_deref(), Some("/descr.jpg"));
    }

    #[test]
    fn test_description_without_qualifying_image_does_not_fall_back() {
        let html = r#"<div id="content">
            <img src="/content.jpg">
            <div class="descr_text"><img src="/pic/arrow.png"></div>
        </div>"#;
        assert_eq!(find_poster(html), None);
    }

    #[test]
    fn test_missing_src_and_no_images() {
        assert_eq!(find_poster(&content(r#"<img alt="x">"#)), None);
        assert_eq!(find_poster(&content("<p>nothing</p>")), None);
        assert_eq!(find_poster("<p>no content region</p>"), None);
    }

    #[test]
    fn test_content_image_with_icon() {
        let html = content(
            r#"<img src="/icons/info.png" width="20" height="20"><img src="http://img/poster.jpg" width="300" height="450">"#,
        );
        assert_eq!(find_poster(&html).as_deref(), Some("http://img/poster.jpg"));
    }
}
