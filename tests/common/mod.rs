#![allow(dead_code)]

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tempfile::TempDir;

use formsift::schema::LabelFamilyConfig;
use formsift::{CorpusConfig, LabelType, Storage};

pub const LOGIN_PAGE: &str = r#"<html><body>
<h1>Welcome back</h1>
<form method="POST" action="/login">
  <input type="text" name="username">
  <input type="password" name="password">
  <input type="submit" value="Login">
</form>
</body></html>"#;

pub fn corpus_config() -> CorpusConfig {
    CorpusConfig {
        form_types: LabelFamilyConfig {
            types: vec![
                LabelType::new("search", "s"),
                LabelType::new("login", "l"),
                LabelType::new("registration", "r"),
                LabelType::new("password/login recovery", "p"),
                LabelType::new("contact/comment", "c"),
                LabelType::new("other", "o"),
            ],
            na_value: "X".into(),
            skip_value: "-".into(),
            simplify_map: IndexMap::from([("p".to_string(), "l".to_string())]),
        },
        field_types: LabelFamilyConfig {
            types: vec![
                LabelType::new("username", "l"),
                LabelType::new("password", "p"),
                LabelType::new("password confirmation", "c"),
                LabelType::new("email", "e"),
                LabelType::new("search query", "q"),
                LabelType::new("full name", "n"),
                LabelType::new("comment text", "m"),
            ],
            na_value: "XX".into(),
            skip_value: "--".into(),
            simplify_map: IndexMap::from([("c".to_string(), "p".to_string())]),
        },
    }
}

/// One page of the synthetic corpus with its labels.
pub struct SyntheticPage {
    pub url: String,
    pub html: String,
    pub forms: Vec<String>,
    pub fields: Vec<BTreeMap<String, String>>,
}

fn pick<'a>(options: &[&'a str], i: usize) -> &'a str {
    options[i % options.len()]
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(name, code)| (name.to_string(), code.to_string()))
        .collect()
}

pub fn login_form(i: usize) -> (String, BTreeMap<String, String>) {
    let user = pick(&["username", "login", "user", "username"], i);
    let pw = pick(&["password", "pass", "pwd"], i);
    let action = pick(&["/login", "/signin", "/account/login"], i);
    let submit = pick(&["Login", "Log in", "Sign in"], i);
    let html = format!(
        r#"<form id="login-{i}" method="post" action="{action}">
  <label for="user-{i}">Username</label>
  <input id="user-{i}" type="text" name="{user}">
  <label for="pw-{i}">Password</label>
  <input id="pw-{i}" type="password" name="{pw}">
  <input type="hidden" name="csrf" value="token{i}">
  <input type="submit" value="{submit}">
  <a href="/forgot">Forgot your password?</a>
</form>"#
    );
    (html, labels(&[(user, "l"), (pw, "p")]))
}

pub fn search_form(i: usize) -> (String, BTreeMap<String, String>) {
    let q = pick(&["q", "query", "s", "search"], i);
    let html = format!(
        r#"<form id="search-{i}" action="/search" class="search-box">
  <input type="search" name="{q}" placeholder="Search the site">
  <button type="submit">Search</button>
</form>"#
    );
    (html, labels(&[(q, "q")]))
}

pub fn registration_form(i: usize) -> (String, BTreeMap<String, String>) {
    let email = pick(&["email", "mail", "user_email"], i);
    let pw = pick(&["password", "new_password"], i);
    let confirm = pick(&["password2", "confirm", "password_confirm"], i);
    let submit = pick(&["Register", "Sign up", "Create account"], i);
    let html = format!(
        r#"<form id="register-{i}" method="post" action="/register">
  <h2>Create your account</h2>
  <label>Email <input type="email" name="{email}"></label>
  <label>Password <input type="password" name="{pw}"></label>
  <label>Repeat password <input type="password" name="{confirm}"></label>
  <input type="checkbox" name="terms"> I agree to the terms
  <input type="submit" value="{submit}">
</form>"#
    );
    (
        html,
        labels(&[(email, "e"), (pw, "p"), (confirm, "c"), ("terms", "--")]),
    )
}

pub fn contact_form(i: usize) -> (String, BTreeMap<String, String>) {
    let name = pick(&["name", "fullname", "your_name"], i);
    let message = pick(&["message", "comment", "body"], i);
    let html = format!(
        r#"<form id="contact-{i}" method="post" action="/contact">
  <input name="{name}" placeholder="Your name">
  <input type="email" name="email" placeholder="Your email">
  <textarea name="{message}" placeholder="Your message"></textarea>
  <input type="submit" value="Send message">
</form>"#
    );
    (html, labels(&[(name, "n"), ("email", "e"), (message, "m")]))
}

/// One page per domain holding a login, search, registration and contact
/// form, in that order.
pub fn synthetic_pages(n_domains: usize) -> Vec<SyntheticPage> {
    (0..n_domains)
        .map(|i| {
            let forms = [login_form(i), search_form(i), registration_form(i), contact_form(i)];
            let body = forms
                .iter()
                .map(|(html, _)| html.as_str())
                .collect::<Vec<_>>()
                .join("\n<p>More content</p>\n");
            SyntheticPage {
                url: format!("http://www.shop{i}.com/account"),
                html: format!("<html><head><title>Shop {i}</title></head><body>{body}</body></html>"),
                forms: vec!["l".into(), "s".into(), "r".into(), "c".into()],
                fields: forms.into_iter().map(|(_, fields)| fields).collect(),
            }
        })
        .collect()
}

pub fn empty_corpus() -> (TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path());
    storage.initialize(&corpus_config(), None).unwrap();
    (dir, storage)
}

pub fn build_corpus(n_domains: usize) -> (TempDir, Storage) {
    let (dir, storage) = empty_corpus();
    for page in synthetic_pages(n_domains) {
        storage
            .add_result(&page.html, &page.url, Some(page.forms), Some(page.fields))
            .unwrap();
    }
    (dir, storage)
}

/// Site holding one search form annotated as a login form.
pub const MISLABELED_URL: &str = "http://www.oddities.com/find";

/// `build_corpus` plus a single page whose search form carries the login code.
pub fn build_corpus_with_mislabeled_search(n_domains: usize) -> (TempDir, Storage) {
    let (dir, storage) = build_corpus(n_domains);
    let (html, fields) = search_form(n_domains + 3);
    storage
        .add_result(
            &format!("<html><body>{html}</body></html>"),
            MISLABELED_URL,
            Some(vec!["l".into()]),
            Some(vec![fields]),
        )
        .unwrap();
    (dir, storage)
}
