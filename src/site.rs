//! Serving templates over HTTP.
//!
//! A [`Site`] maps request methods and paths to template files, builds a
//! context from the request plus the route's static data, and renders the
//! page. `POST` routes also see the fields of an
//! `application/x-www-form-urlencoded` body; a body that does not decode is
//! answered with 400. Engine errors are logged and answered with a generic
//! 500 page; their text is never sent to the client.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rouille::{Request, Response};
use serde::Deserialize;
use thiserror::Error;

use crate::error::RenderError;
use crate::scope::{context_from_json, Context};
use crate::value::Value;
use crate::{RenderOptions, Renderer};

pub const NOT_FOUND_PAGE: &str = "<html><body><h1>404 Not Found</h1></body></html>";
pub const BAD_REQUEST_PAGE: &str = "<html><body><h1>400 Bad Request</h1></body></html>";
pub const ERROR_PAGE: &str = "<html><body><h1>500 Internal Server Error</h1></body></html>";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Form bodies larger than this are rejected with 400.
pub const MAX_FORM_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid site config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rendering {} failed: {source}", .path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("cannot listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Site configuration as stored in a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Directory templates are read from. Relative paths are taken
    /// relative to the config file.
    pub template_dir: PathBuf,
    #[serde(default)]
    pub trim_blocks: bool,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// `GET` or `POST`. Matched case-insensitively.
    #[serde(default = "default_method")]
    pub method: String,
    /// Request path, e.g. `/posts`.
    pub path: String,
    /// Template file, relative to `template_dir`.
    pub template: PathBuf,
    /// Variables available to the template in addition to the request
    /// data. These win over request data of the same name.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

fn default_method() -> String {
    "GET".into()
}

impl SiteConfig {
    pub fn load(path: &Path) -> Result<Self, SiteError> {
        let text = fs::read_to_string(path).map_err(|source| SiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SiteConfig =
            serde_json::from_str(&text).map_err(|source| SiteError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        if config.template_dir.is_relative() {
            if let Some(base) = path.parent() {
                config.template_dir = base.join(&config.template_dir);
            }
        }
        Ok(config)
    }
}

/// Reads a whole template file. The file is closed before returning, on
/// success and on error alike.
pub fn load_template(path: &Path) -> Result<String, SiteError> {
    fs::read_to_string(path).map_err(|source| SiteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of resolving one request.
#[derive(Debug)]
pub enum Page {
    Rendered(String),
    NotFound,
    /// The request body could not be decoded.
    BadRequest(String),
    Failed(SiteError),
}

struct Route {
    template: PathBuf,
    context: Context,
}

pub struct Site {
    /// method -> path -> route
    routes: HashMap<String, HashMap<String, Route>>,
    renderer: Renderer,
}

impl Site {
    pub fn new(config: SiteConfig) -> Self {
        let SiteConfig {
            template_dir,
            trim_blocks,
            max_depth,
            routes,
        } = config;
        let mut by_method: HashMap<String, HashMap<String, Route>> = HashMap::new();
        for route in routes {
            by_method
                .entry(route.method.to_ascii_uppercase())
                .or_default()
                .insert(
                    route.path,
                    Route {
                        template: template_dir.join(route.template),
                        context: context_from_json(route.context),
                    },
                );
        }
        let options = RenderOptions {
            trim_blocks,
            max_depth,
        };
        Self {
            routes: by_method,
            renderer: Renderer::new(options),
        }
    }

    /// `(method, path)` pairs this site answers, in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().flat_map(|(method, paths)| {
            paths.keys().map(move |path| (method.as_str(), path.as_str()))
        })
    }

    /// Resolves a request given its method, path, raw query string and, for
    /// form submissions, the raw form body.
    pub fn page(&self, method: &str, path: &str, query: &str, form: Option<&[u8]>) -> Page {
        let Some(route) = self.routes.get(method).and_then(|paths| paths.get(path)) else {
            return Page::NotFound;
        };
        let form = match form.map(parse_form).transpose() {
            Ok(fields) => fields.unwrap_or_default(),
            Err(reason) => return Page::BadRequest(reason),
        };

        let mut context = request_context(method, path, query, form);
        context.extend(
            route
                .context
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        let rendered = load_template(&route.template).and_then(|template| {
            self.renderer
                .render(&template, &context)
                .map_err(|source| SiteError::Render {
                    path: route.template.clone(),
                    source,
                })
        });
        match rendered {
            Ok(body) => Page::Rendered(body),
            Err(err) => Page::Failed(err),
        }
    }

    pub fn handle(&self, request: &Request) -> Response {
        let body = match form_body(request) {
            Ok(body) => body,
            Err(reason) => return bad_request(request, &reason),
        };
        let page = self.page(
            request.method(),
            &request.url(),
            request.raw_query_string(),
            body.as_deref(),
        );
        match page {
            Page::Rendered(body) => Response::html(body),
            Page::NotFound => Response::html(NOT_FOUND_PAGE).with_status_code(404),
            Page::BadRequest(reason) => bad_request(request, &reason),
            Page::Failed(err) => {
                warn!("{} {}: {err}", request.method(), request.raw_url());
                Response::html(ERROR_PAGE).with_status_code(500)
            }
        }
    }
}

fn bad_request(request: &Request, reason: &str) -> Response {
    warn!("{} {}: {reason}", request.method(), request.raw_url());
    Response::html(BAD_REQUEST_PAGE).with_status_code(400)
}

/// Reads the body of a form submission. Requests of any other content type
/// have no form body.
fn form_body(request: &Request) -> Result<Option<Vec<u8>>, String> {
    if !is_form(request.header("Content-Type")) {
        return Ok(None);
    }
    let Some(data) = request.data() else {
        return Err("request body already consumed".into());
    };
    let mut body = Vec::new();
    data.take(MAX_FORM_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| format!("reading form body: {e}"))?;
    if body.len() > MAX_FORM_BYTES {
        return Err(format!("form body larger than {MAX_FORM_BYTES} bytes"));
    }
    Ok(Some(body))
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Decodes an `application/x-www-form-urlencoded` body into string
/// variables. The body must be UTF-8 and every non-empty field must have a
/// `=`; a repeated name keeps its last value.
pub fn parse_form(body: &[u8]) -> Result<Context, String> {
    let text = std::str::from_utf8(body).map_err(|_| "form body is not UTF-8".to_string())?;
    if let Some(field) = text.split('&').find(|f| !f.is_empty() && !f.contains('=')) {
        return Err(format!("malformed form field `{field}`"));
    }
    Ok(decode_pairs(body))
}

fn decode_pairs(input: &[u8]) -> Context {
    url::form_urlencoded::parse(input)
        .map(|(name, value)| (name.into_owned(), Value::String(value.into_owned())))
        .collect()
}

/// Variables derived from the request itself: one string per query
/// parameter, then the form fields, then `request_method` and
/// `request_path`. Later entries win.
pub fn request_context(method: &str, path: &str, query: &str, form: Context) -> Context {
    let mut context = decode_pairs(query.as_bytes());
    context.extend(form);
    context.insert("request_method".into(), Value::from(method));
    context.insert("request_path".into(), Value::from(path));
    context
}

/// Serves `site` on `addr` until the process exits. Each connection is
/// handled on rouille's worker threads.
pub fn serve(addr: &str, site: Site) -> Result<(), SiteError> {
    let server = rouille::Server::new(addr, move |request| {
        let response = site.handle(request);
        info!(
            "{} {} -> {}",
            request.method(),
            request.raw_url(),
            response.status_code
        );
        response
    })
    .map_err(|e| SiteError::Bind {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    info!("listening on {}", server.server_addr());
    server.run();
    Ok(())
}
