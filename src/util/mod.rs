//! Utility functions shared by the feed transforms and the HTML renderer.
//!
//! - **URL validation**: absolute HTTP(S) checks and relative media path qualification
//! - **Text processing**: HTML escaping and blank-field folding
//!
//! # Examples
//!
//! ```
//! use newsroll::util::{escape_html, is_absolute_http};
//!
//! assert!(is_absolute_http("https://example.com/story"));
//! assert_eq!(escape_html("A < B"), "A &lt; B");
//! ```

mod text;
mod url_validator;

pub use text::{escape_html, non_blank};
pub use url_validator::{is_absolute_http, qualify_url, validate_url, UrlValidationError};
