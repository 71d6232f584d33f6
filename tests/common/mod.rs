//! HTML fixtures shaped like a review listing.

#![allow(dead_code)]

pub const BASE: &str = "https://test.local";

pub fn review_url(location: &str, slug: &str, page: u32) -> String {
    if page == 1 {
        format!("{}/{}/{}/reviews", BASE, location, slug)
    } else {
        format!("{}/{}/{}/reviews?page={}", BASE, location, slug, page)
    }
}

pub struct Review<'a> {
    pub reviewer: &'a str,
    pub text: &'a str,
    pub rating_html: &'a str,
    pub extra: &'a str,
}

impl<'a> Review<'a> {
    pub fn new(reviewer: &'a str, text: &'a str) -> Self {
        Self {
            reviewer,
            text,
            rating_html: "",
            extra: "",
        }
    }

    pub fn rating(mut self, html: &'a str) -> Self {
        self.rating_html = html;
        self
    }

    pub fn extra(mut self, html: &'a str) -> Self {
        self.extra = html;
        self
    }

    pub fn render(&self) -> String {
        format!(
            r#"<section class="sc-review-card review">
                <a href="/users/{id}" class="sc-user">{name}</a>
                {rating}
                <p class="sc-time">2 days ago</p>
                <p class="sc-body">{text}</p>
                {extra}
            </section>"#,
            id = self.reviewer.to_lowercase().replace(' ', "-"),
            name = self.reviewer,
            rating = self.rating_html,
            text = self.text,
            extra = self.extra,
        )
    }
}

pub fn stars(filled: usize) -> String {
    let mut html = String::from(r#"<div class="sc-stars">"#);
    for i in 0..5 {
        let state = if i < filled { "star-filled" } else { "star-empty" };
        html.push_str(&format!(r#"<i class="icon {}"></i>"#, state));
    }
    html.push_str("</div>");
    html
}

/// A full page: title, reviews, and numbered pagination up to `total_pages`.
pub fn listing_page(name: &str, location: &str, slug: &str, page: u32, total_pages: u32, reviews: &[Review]) -> String {
    let body: String = reviews.iter().map(Review::render).collect();
    let pagination: String = (1..=total_pages)
        .map(|n| format!(r#"<a href="{}">{}</a>"#, review_url(location, slug, n), n))
        .collect();
    format!(
        r#"<!DOCTYPE html>
        <html><head><title>{name}, {loc} | Zomato</title></head>
        <body>
            <h1>{name}</h1>
            <div class="reviews-list">{body}</div>
            <nav class="pagination">{pagination}</nav>
            <footer>page {page}</footer>
        </body></html>"#,
        name = name,
        loc = location,
        body = body,
        pagination = pagination,
        page = page,
    )
}
