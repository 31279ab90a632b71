//! Injection of client state and asset tags into rendered fallback markup.

use super::manifest::EntryAssets;
use crate::error::SerializedError;
use http::Uri;
use serde::Serialize;

const HEAD_CLOSE: &[u8] = b"</head>";

/// The request url, as exposed to client side code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ClientUrl<'a> {
    href: String,
    path: &'a str,
    query: Option<&'a str>,
}

impl<'a> ClientUrl<'a> {
    pub(crate) fn new(uri: &'a Uri) -> Self {
        Self {
            href: uri.to_string(),
            path: uri.path(),
            query: uri.query(),
        }
    }
}

/// Serialize a value as json that is safe to embed in a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Build the markup inserted right before `</head>`:
/// the client state script, followed by style and script tags.
pub(crate) fn head_snippet(
    url: &Uri,
    error: &SerializedError,
    assets: &EntryAssets,
) -> Result<String, serde_json::Error> {
    let mut snippet = format!(
        "<script>window.serverUrl = {url};window.serverError = Object.assign(new Error({message}), {error});</script>",
        url = script_json(&ClientUrl::new(url))?,
        message = script_json(&error.message)?,
        error = script_json(error)?,
    );
    for href in &assets.css {
        snippet.push_str(&format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_attr(href)
        ));
    }
    for src in &assets.js {
        snippet.push_str(&format!(
            r#"<script src="{}" defer charset="utf-8" crossorigin="anonymous"></script>"#,
            escape_attr(src)
        ));
    }
    Ok(snippet)
}

/// Insert `snippet` right before the first closing head tag of `markup`,
/// matched ascii case insensitive.
///
/// Markup without one is handed back unchanged as error.
pub(crate) fn inject_into_head(mut markup: String, snippet: &str) -> Result<String, String> {
    let Some(idx) = markup
        .as_bytes()
        .windows(HEAD_CLOSE.len())
        .position(|window| window.eq_ignore_ascii_case(HEAD_CLOSE))
    else {
        return Err(markup);
    };
    markup.insert_str(idx, snippet);
    Ok(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> SerializedError {
        SerializedError {
            status: 500,
            message: message.to_owned(),
            stack: None,
        }
    }

    #[test]
    fn snippet_orders_state_styles_scripts() {
        let uri: Uri = "/shop?page=2".parse().unwrap();
        let assets = EntryAssets {
            js: vec!["/static/a.js".to_owned(), "/static/b.js".to_owned()],
            css: vec!["/static/a.css".to_owned()],
        };
        let snippet = head_snippet(&uri, &error("boom"), &assets).unwrap();

        assert!(snippet.starts_with(
            r#"<script>window.serverUrl = {"href":"/shop?page=2","path":"/shop","query":"page=2"};"#
        ));
        assert!(snippet.contains(
            r#"window.serverError = Object.assign(new Error("boom"), {"status":500,"message":"boom"});</script>"#
        ));
        let css = snippet.find("/static/a.css").unwrap();
        let js_a = snippet.find("/static/a.js").unwrap();
        let js_b = snippet.find("/static/b.js").unwrap();
        assert!(css < js_a && js_a < js_b);
    }

    #[test]
    fn snippet_cannot_break_out_of_script() {
        let uri: Uri = "/".parse().unwrap();
        let snippet =
            head_snippet(&uri, &error("</script><script>alert(1)</script>"), &EntryAssets::default())
                .unwrap();
        assert_eq!(snippet.matches("</script>").count(), 1);
        assert!(snippet.contains("\\u003c/script>"));
    }

    #[test]
    fn asset_urls_are_attribute_escaped() {
        let uri: Uri = "/".parse().unwrap();
        let assets = EntryAssets {
            js: vec![r#"/x.js"onload="evil()"#.to_owned()],
            css: Vec::new(),
        };
        let snippet = head_snippet(&uri, &error("e"), &assets).unwrap();
        assert!(snippet.contains(r#"src="/x.js&quot;onload=&quot;evil()""#));
    }

    #[test]
    fn inject_before_first_head_close() {
        let markup = "<html><head><title>x</title></head><body></head></body></html>".to_owned();
        assert_eq!(
            inject_into_head(markup, "<!--s-->").unwrap(),
            "<html><head><title>x</title><!--s--></head><body></head></body></html>"
        );
    }

    #[test]
    fn inject_matches_head_close_in_any_case() {
        let markup = "<HTML><HEAD><TITLE>é</TITLE></Head><BODY></BODY></HTML>".to_owned();
        assert_eq!(
            inject_into_head(markup, "<!--s-->").unwrap(),
            "<HTML><HEAD><TITLE>é</TITLE><!--s--></Head><BODY></BODY></HTML>"
        );
    }

    #[test]
    fn inject_without_head_hands_markup_back() {
        assert_eq!(
            inject_into_head("<p>hi</p>".to_owned(), "<!--s-->").unwrap_err(),
            "<p>hi</p>"
        );
    }
}
