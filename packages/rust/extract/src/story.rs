//! Answer page parsing: full answer markup and author credentials.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use storyfeed_shared::{AuthorField, AuthorMap, Result, StoryFeedError};

use crate::count::parse_count;
use crate::credential::credential_field_name;
use crate::dom::{attr, first, non_empty_text, resolve, selector, text_of};

/// Answer containers, most specific first.
static ANSWER_CONTAINERS: LazyLock<[Selector; 2]> =
    LazyLock::new(|| [selector(".ExpandedAnswer"), selector(".AnswerPageAnswer")]);
static ANSWER_BODY: LazyLock<Selector> = LazyLock::new(|| selector(".rendered_qtext"));
static ANSWER_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static COUNT: LazyLock<Selector> = LazyLock::new(|| selector(".count"));
static AUTHOR_PANEL: LazyLock<Selector> = LazyLock::new(|| selector(".AboutAuthorSection"));
static AUTHOR_AVATAR: LazyLock<Selector> = LazyLock::new(|| selector("img.profile_photo_img"));
static CREDENTIAL_ROW: LazyLock<Selector> = LazyLock::new(|| selector(".AboutListItem"));
static MAIN_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".main_text"));
static DETAIL_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".detail_text"));

/// Content extracted from an answer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullStory {
    /// Inner markup of the answer body, unsanitized. Serialized from the
    /// parsed tree, so void tags and entities come out in canonical form.
    pub content_html: String,
    /// First image inside the answer body.
    pub cover_url: Option<String>,
    /// Upvote count shown on the answer page, when present.
    pub upvote_count: Option<u32>,
    /// `None` when the page has no author panel.
    pub author: Option<AuthorMap>,
    pub author_avatar_url: Option<String>,
}

/// Parse a full answer page.
///
/// Fails when no answer body can be located, or when the page shows an upvote
/// count in an unrecognized format. A malformed credential row is skipped
/// without affecting the other rows.
pub fn parse_full_story(html: &str, base: &Url) -> Result<FullStory> {
    let doc = Html::parse_document(html);

    let container = ANSWER_CONTAINERS
        .iter()
        .find_map(|sel| doc.select(sel).next())
        .ok_or_else(|| StoryFeedError::parse("answer container not found"))?;
    let body = first(container, &ANSWER_BODY)
        .ok_or_else(|| StoryFeedError::parse("answer body not found"))?;

    let content_html = body.inner_html();
    let cover_url = body
        .select(&ANSWER_IMAGE)
        .find_map(|img| attr(img, "master_src").or_else(|| attr(img, "src")))
        .and_then(|src| resolve(base, &src));

    let upvote_count = match first(container, &COUNT) {
        Some(el) => Some(parse_count(&text_of(el))?),
        None => None,
    };

    let panel = doc.select(&AUTHOR_PANEL).next();
    let author_avatar_url = panel
        .and_then(|p| first(p, &AUTHOR_AVATAR))
        .and_then(|img| attr(img, "src"))
        .and_then(|src| resolve(base, &src));
    let author = panel.map(parse_author_panel);

    Ok(FullStory {
        content_html,
        cover_url,
        upvote_count,
        author,
        author_avatar_url,
    })
}

/// Collect every well-formed credential row of the author panel.
fn parse_author_panel(panel: ElementRef<'_>) -> AuthorMap {
    let mut author = AuthorMap::new();
    for row in panel.select(&CREDENTIAL_ROW) {
        match parse_credential_row(row) {
            Some((name, field)) => {
                author.insert(name, field);
            }
            None => debug!(
                class = row.value().attr("class").unwrap_or(""),
                "skipping malformed credential row"
            ),
        }
    }
    author
}

fn parse_credential_row(row: ElementRef<'_>) -> Option<(String, AuthorField)> {
    let name = credential_field_name(row.value().classes())?;
    let main = first(row, &MAIN_TEXT).and_then(non_empty_text)?;
    let detail = first(row, &DETAIL_TEXT).and_then(non_empty_text);
    Some((name, AuthorField { main, detail }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.example.com").unwrap()
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn parses_answer_page_fixture() {
        let story = parse_full_story(&load_fixture("answer_page.html"), &base()).unwrap();

        assert!(story.content_html.contains("<p>Rust is a systems programming language"));
        assert!(story.content_html.contains("qtext_image_wrapper"));
        assert_eq!(
            story.cover_url.as_deref(),
            Some("https://img.example.com/rust-logo.png")
        );
        assert_eq!(story.upvote_count, Some(1300));
        assert_eq!(
            story.author_avatar_url.as_deref(),
            Some("https://img.example.com/jane.png")
        );

        let author = story.author.expect("author panel");
        assert_eq!(author.len(), 2);
        assert_eq!(author["work_credential"].main, "Engineer at Acme");
        assert_eq!(author["work_credential"].detail.as_deref(), Some("2015–present"));
        assert_eq!(author["location_credential"].main, "Lives in Berlin");
        assert_eq!(author["location_credential"].detail, None);
    }

    #[test]
    fn malformed_credential_row_is_isolated() {
        // Middle row has no main text; the other two still come through.
        let html = r#"<html><body>
            <div class="ExpandedAnswer"><span class="rendered_qtext"><p>Body</p></span></div>
            <div class="AboutAuthorSection">
                <div class="AboutListItem WorkCredentialListItem">
                    <span class="main_text">Engineer</span><span class="detail_text">Acme</span>
                </div>
                <div class="AboutListItem SchoolCredentialListItem">
                    <span class="detail_text">Class of 2010</span>
                </div>
                <div class="AboutListItem LocationCredentialListItem">
                    <span class="main_text">Berlin</span>
                </div>
            </div>
        </body></html>"#;
        let story = parse_full_story(html, &base()).unwrap();
        let author = story.author.unwrap();

        assert_eq!(author.len(), 2);
        assert!(author.contains_key("work_credential"));
        assert!(author.contains_key("location_credential"));
        assert!(!author.contains_key("school_credential"));
    }

    #[test]
    fn unrecognized_credential_class_is_skipped() {
        let html = r#"<html><body>
            <div class="ExpandedAnswer"><span class="rendered_qtext">Body</span></div>
            <div class="AboutAuthorSection">
                <div class="AboutListItem"><span class="main_text">No type class</span></div>
                <div class="AboutListItem odd-row"><span class="main_text">Bad type class</span></div>
                <div class="AboutListItem ViewsCredentialListItem"><span class="main_text">1.2m views</span></div>
            </div>
        </body></html>"#;
        let author = parse_full_story(html, &base()).unwrap().author.unwrap();
        assert_eq!(author.keys().collect::<Vec<_>>(), vec!["views_credential"]);
    }

    #[test]
    fn content_is_inner_markup() {
        let html = r#"<html><body><div class="ExpandedAnswer">
            <span class="rendered_qtext"><p>One</p><p>Two <b>bold</b></p></span>
        </div></body></html>"#;
        let story = parse_full_story(html, &base()).unwrap();
        assert_eq!(story.content_html, "<p>One</p><p>Two <b>bold</b></p>");
        assert_eq!(story.author, None);
        assert_eq!(story.upvote_count, None);
        assert_eq!(story.cover_url, None);
    }

    #[test]
    fn content_markup_is_serialized_canonically() {
        let html = r#"<html><body><div class="ExpandedAnswer">
            <span class="rendered_qtext"><p>Line one<br/>Line &#39;two&#39;</p></span>
        </div></body></html>"#;
        let story = parse_full_story(html, &base()).unwrap();
        assert_eq!(story.content_html, "<p>Line one<br>Line 'two'</p>");
    }

    #[test]
    fn falls_back_to_answer_page_container() {
        let html = r#"<html><body><div class="AnswerPageAnswer">
            <span class="rendered_qtext"><p>Fallback</p></span>
        </div></body></html>"#;
        let story = parse_full_story(html, &base()).unwrap();
        assert_eq!(story.content_html, "<p>Fallback</p>");
    }

    #[test]
    fn missing_answer_is_an_error() {
        let err = parse_full_story("<html><body><p>Nothing</p></body></html>", &base())
            .unwrap_err();
        assert!(matches!(err, StoryFeedError::Parse { .. }));
    }

    #[test]
    fn invalid_count_propagates() {
        let html = r#"<html><body><div class="ExpandedAnswer">
            <span class="rendered_qtext">Body</span><span class="count">many</span>
        </div></body></html>"#;
        let err = parse_full_story(html, &base()).unwrap_err();
        assert!(matches!(err, StoryFeedError::InvalidCountFormat(ref s) if s == "many"));
    }
}
