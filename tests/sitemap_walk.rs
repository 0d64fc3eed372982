use brokercrawl::scrapers::SitemapCollector;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn index(base: &str, children: &[&str]) -> String {
    let entries: String = children
        .iter()
        .map(|c| format!("<sitemap><loc>{}{}</loc></sitemap>", base, c))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        entries
    )
}

fn urlset(base: &str, pages: &[&str]) -> String {
    let entries: String = pages
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", base, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cyclic_index_terminates() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(&server, "/sitemap.xml", 200, index(&base, &["/a.xml", "/b.xml"])).await;
    // a.xml points back at the root and at b.xml
    serve(&server, "/a.xml", 200, index(&base, &["/sitemap.xml", "/b.xml", "/missing.xml"])).await;
    serve(
        &server,
        "/b.xml",
        200,
        urlset(&base, &["/brokers/one", "/broker-reviews/two/", "/brokers/one"]),
    )
    .await;
    serve(&server, "/missing.xml", 404, String::new()).await;

    let collector = SitemapCollector::new("brokercrawl-test/1.0").unwrap();
    let urls = collector.collect(&format!("{}/sitemap.xml", base)).await;

    let expected: Vec<String> = vec![
        format!("{}/broker-reviews/two/", base),
        format!("{}/brokers/one", base),
    ];
    assert_eq!(urls.into_iter().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn test_unreachable_root_yields_nothing() {
    let server = MockServer::start().await;
    serve(&server, "/sitemap.xml", 200, "<html>not xml</html>".to_string()).await;

    let collector = SitemapCollector::new("brokercrawl-test/1.0").unwrap();
    let urls = collector
        .collect(&format!("{}/sitemap.xml", server.uri()))
        .await;
    assert!(urls.is_empty());
}
