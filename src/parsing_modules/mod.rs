//! Page-structure parsers shared by the extraction pipeline and the walker.
//!
//! - **JSON-LD**: schema.org listing blocks (`<script type="application/ld+json">`)
//!   carrying the restaurant's name, aggregate rating and embedded reviews
//! - **Pagination**: next-page and numbered page links
//!
//! Both take an already parsed [`scraper::Html`].

pub mod json_ld_parser;
pub mod pagination_parser;
