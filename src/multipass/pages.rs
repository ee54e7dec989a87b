//! Replaceable HTML pages for the login flow.

use std::fmt::Write;

use super::cookies::{CSRF_FORM_FIELD, NEXT_URL_QUERY_PARAM};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Login,
    ContinueOrSignout,
    TokenInvalid,
    TokenSent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageContext {
    pub page: Page,
    pub login_path: String,
    pub signout_path: String,
    pub next_url: Option<String>,
    pub csrf_token: Option<String>,
}

/// Renders a page. Implementations must escape every context value they
/// interpolate.
pub trait Templates: Send + Sync {
    fn render(&self, context: &PageContext) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTemplates;

impl Templates for DefaultTemplates {
    fn render(&self, context: &PageContext) -> String {
        let mut body = String::new();
        match context.page {
            Page::Login => login_form(&mut body, context, "Log in"),
            Page::TokenInvalid => {
                body.push_str("<p>Your login link is invalid or has expired.</p>\n");
                login_form(&mut body, context, "Send a new link");
            }
            Page::ContinueOrSignout => {
                if let Some(next) = &context.next_url {
                    let _ = writeln!(body, "<p><a href=\"{}\">Continue</a></p>", escape_html(next));
                }
                let _ = writeln!(
                    body,
                    "<form method=\"post\" action=\"{}\">",
                    escape_html(&context.signout_path)
                );
                csrf_field(&mut body, context);
                body.push_str("<button type=\"submit\">Sign out</button>\n</form>\n");
            }
            Page::TokenSent => {
                body.push_str(
                    "<p>If your handle is known, a login link is on its way. \
                     Check your messages.</p>\n",
                );
            }
        }
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Multipass</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
        )
    }
}

fn login_form(body: &mut String, context: &PageContext, submit: &str) {
    let _ = writeln!(
        body,
        "<form method=\"post\" action=\"{}\">",
        escape_html(&context.login_path)
    );
    body.push_str("<input type=\"text\" name=\"handle\" placeholder=\"handle\" autofocus>\n");
    if let Some(next) = &context.next_url {
        let _ = writeln!(
            body,
            "<input type=\"hidden\" name=\"{NEXT_URL_QUERY_PARAM}\" value=\"{}\">",
            escape_html(next)
        );
    }
    csrf_field(body, context);
    let _ = writeln!(body, "<button type=\"submit\">{submit}</button>\n</form>");
}

fn csrf_field(body: &mut String, context: &PageContext) {
    if let Some(token) = &context.csrf_token {
        let _ = writeln!(
            body,
            "<input type=\"hidden\" name=\"{CSRF_FORM_FIELD}\" value=\"{}\">",
            escape_html(token)
        );
    }
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
