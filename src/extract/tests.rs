use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <title>  Ownership   Explained </title>
    <style>body { color: red; }</style>
    <script>var tracking = true;</script>
</head>
<body>
    <header><nav><a href="/">Home</a> <a href="/blog">Blog</a></nav></header>
    <div class="sidebar">Related posts</div>
    <article>
        <h1>Ownership</h1>
        <p>Each value has an <em>owner</em>.</p>
        <p>When the owner goes out of scope,
           the value is dropped.</p>
        <ul><li>Move</li><li>Borrow</li></ul>
        <div class="advertisement">Buy now</div>
    </article>
    <footer>Copyright</footer>
</body>
</html>
"#;

#[test]
fn article_text_is_extracted() {
    let page = html_to_page(ARTICLE_PAGE).expect("valid html");

    assert_eq!(page.title.as_deref(), Some("Ownership Explained"));
    assert_eq!(
        page.text,
        "Ownership\nEach value has an owner.\nWhen the owner goes out of scope, the value is dropped.\nMove\nBorrow"
    );
}

#[test]
fn boilerplate_is_removed() {
    let page = html_to_page(ARTICLE_PAGE).expect("valid html");

    for unwanted in ["Home", "Related posts", "Buy now", "Copyright", "tracking", "color"] {
        assert!(
            !page.text.contains(unwanted),
            "{unwanted:?} should not be extracted"
        );
    }
}

#[test]
fn body_is_used_without_main_content() {
    let html = r#"<html><body><h1>Heading</h1><p>First paragraph.</p><script>ignored()</script><p>Second.</p></body></html>"#;
    let page = html_to_page(html).expect("valid html");

    assert_eq!(page.title.as_deref(), Some("Heading"));
    assert_eq!(page.text, "Heading\nFirst paragraph.\nSecond.");
}

#[test]
fn empty_document_has_no_text() {
    let page = html_to_page("").expect("empty html still parses");
    assert_eq!(page.title, None);
    assert!(page.text.is_empty());
}

#[test]
fn non_http_urls_are_rejected() {
    assert!(matches!(
        fetch_page("ftp://example.com/file"),
        Err(BrainError::Network(_))
    ));
    assert!(matches!(fetch_page("not a url"), Err(BrainError::Network(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_page_downloads_and_extracts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string(ARTICLE_PAGE),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/post", server.uri());
    let page = tokio::task::spawn_blocking(move || fetch_page(&url))
        .await
        .expect("blocking task")
        .expect("fetch succeeds");

    assert_eq!(page.title.as_deref(), Some("Ownership Explained"));
    assert!(page.text.contains("Each value has an owner"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_page_reports_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let result = tokio::task::spawn_blocking(move || fetch_page(&url))
        .await
        .expect("blocking task");
    assert!(matches!(result, Err(BrainError::Network(_))));
}
