use std::fs;
use std::io::Read;
use std::path::Path;

use tempfile::TempDir;
use tmplite::site::{
    load_template, Page, Site, SiteConfig, SiteError, BAD_REQUEST_PAGE, ERROR_PAGE,
    FORM_CONTENT_TYPE, MAX_FORM_BYTES, NOT_FOUND_PAGE,
};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn fixture() -> (TempDir, Site) {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir(&templates).unwrap();

    write(
        &templates,
        "posts.html",
        "<ul>{% for item in items %}<li>{{ item }}</li>{% endfor %}</ul>",
    );
    write(
        &templates,
        "hello.html",
        "{% if name %}Hello {{ name }}{% endif %} at {{ request_path }}",
    );
    write(&templates, "broken.html", "{% for x in title %}{% endfor %}");
    write(
        &templates,
        "submit.html",
        "Form submitted: {{ first_name }} via {{ request_method }}",
    );
    write(
        dir.path(),
        "site.json",
        r#"{
            "template_dir": "templates",
            "routes": [
                {"path": "/posts", "template": "posts.html",
                 "context": {"items": ["Post 1", "Post 2"]}},
                {"path": "/hello", "template": "hello.html"},
                {"path": "/broken", "template": "broken.html",
                 "context": {"title": "not a list"}},
                {"path": "/gone", "template": "missing.html"},
                {"method": "post", "path": "/submit", "template": "submit.html"}
            ]
        }"#,
    );

    let config = SiteConfig::load(&dir.path().join("site.json")).unwrap();
    (dir, Site::new(config))
}

fn body(response: rouille::Response) -> String {
    let (mut reader, _) = response.data.into_reader_and_size();
    let mut body = String::new();
    reader.read_to_string(&mut body).unwrap();
    body
}

fn get(site: &Site, url: &str) -> rouille::Response {
    let request = rouille::Request::fake_http("GET", url, vec![], vec![]);
    site.handle(&request)
}

fn post_form(site: &Site, url: &str, body: &[u8]) -> rouille::Response {
    let headers = vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())];
    let request = rouille::Request::fake_http("POST", url, headers, body.to_vec());
    site.handle(&request)
}

#[test]
fn renders_route_with_static_context() {
    let (_dir, site) = fixture();
    let response = get(&site, "/posts");
    assert_eq!(response.status_code, 200);
    assert_eq!(body(response), "<ul><li>Post 1</li><li>Post 2</li></ul>");
}

#[test]
fn query_parameters_reach_the_template() {
    let (_dir, site) = fixture();
    assert_eq!(body(get(&site, "/hello?name=Ada")), "Hello Ada at /hello");
}

#[test]
fn missing_query_parameter_is_a_server_error() {
    let (_dir, site) = fixture();
    match site.page("GET", "/hello", "", None) {
        Page::Failed(SiteError::Render { .. }) => {}
        other => panic!("unexpected {other:?}"),
    }
    let response = get(&site, "/hello");
    assert_eq!(response.status_code, 500);
}

#[test]
fn unknown_path_and_other_methods_are_not_found() {
    let (_dir, site) = fixture();
    let response = get(&site, "/nope");
    assert_eq!(response.status_code, 404);
    assert_eq!(body(response), NOT_FOUND_PAGE);

    let request = rouille::Request::fake_http("POST", "/posts", vec![], vec![]);
    assert_eq!(site.handle(&request).status_code, 404);

    assert_eq!(get(&site, "/submit").status_code, 404);
}

#[test]
fn form_submission_reaches_the_template() {
    let (_dir, site) = fixture();
    let response = post_form(&site, "/submit", b"first_name=jorma");
    assert_eq!(response.status_code, 200);
    assert_eq!(body(response), "Form submitted: jorma via POST");

    let response = post_form(&site, "/submit", b"first_name=J%C3%B6rma+K");
    assert_eq!(body(response), "Form submitted: Jörma K via POST");
}

#[test]
fn post_without_form_body_renders_without_fields() {
    let (_dir, site) = fixture();
    let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    let request =
        rouille::Request::fake_http("POST", "/submit", headers, br#"{"first_name":"x"}"#.to_vec());
    let response = site.handle(&request);
    assert_eq!(response.status_code, 200);
    assert_eq!(body(response), "Form submitted:  via POST");
}

#[test]
fn malformed_form_body_is_a_bad_request() {
    let (_dir, site) = fixture();
    let response = post_form(&site, "/submit", b"first_name=jorma&broken");
    assert_eq!(response.status_code, 400);
    assert_eq!(body(response), BAD_REQUEST_PAGE);

    assert_eq!(post_form(&site, "/submit", &[b'a', b'=', 0xc3]).status_code, 400);
    assert!(matches!(
        site.page("POST", "/submit", "", Some(&b"broken"[..])),
        Page::BadRequest(_)
    ));
}

#[test]
fn oversized_form_body_is_a_bad_request() {
    let (_dir, site) = fixture();
    let body = vec![b'a'; MAX_FORM_BYTES + 1];
    assert_eq!(post_form(&site, "/submit", &body).status_code, 400);
}

#[test]
fn render_errors_are_not_leaked_to_clients() {
    let (_dir, site) = fixture();
    let response = get(&site, "/broken");
    assert_eq!(response.status_code, 500);
    let text = body(response);
    assert_eq!(text, ERROR_PAGE);
    assert!(!text.contains("iterable"));
}

#[test]
fn missing_template_file_is_an_io_failure() {
    let (_dir, site) = fixture();
    assert!(matches!(site.page("GET", "/gone", "", None), Page::Failed(SiteError::Io { .. })));
    assert_eq!(get(&site, "/gone").status_code, 500);
}

#[test]
fn load_template_reads_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "t.html", "line 1\nline 2\n");
    assert_eq!(load_template(&dir.path().join("t.html")).unwrap(), "line 1\nline 2\n");
    assert!(matches!(
        load_template(&dir.path().join("absent.html")),
        Err(SiteError::Io { .. })
    ));
}

#[test]
fn bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "site.json", r#"{"routes": []}"#);
    assert!(matches!(
        SiteConfig::load(&dir.path().join("site.json")),
        Err(SiteError::Config { .. })
    ));
}

#[test]
fn site_lists_configured_routes() {
    let (_dir, site) = fixture();
    let mut routes: Vec<_> = site.routes().collect();
    routes.sort();
    assert_eq!(
        routes,
        [
            ("GET", "/broken"),
            ("GET", "/gone"),
            ("GET", "/hello"),
            ("GET", "/posts"),
            ("POST", "/submit"),
        ]
    );
}
