//! Pipeline stages for résumé rendering.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! schema ──▶ dates ──▶ template ──▶ markup ──▶ layout ──▶ document ──▶ render ──▶ encode
//! (JSON)    (Month YYYY) (handlebars) (XML)   (pages)    (lopdf)     (pdfium)   (base64)
//! ```
//!
//! 1. [`schema`]: structural and format validation of the request body
//! 2. [`dates`]: experience dates from `YYYY-MM` to `Month YYYY`
//! 3. [`template`]: substitute the résumé into the variant's template
//! 4. [`markup`]: parse the page-description markup into blocks
//! 5. [`layout`]: line-break and paginate blocks using [`fonts`] metrics
//! 6. [`document`]: write the positioned pages as a PDF
//! 7. [`render`]: rasterise page one; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 8. [`encode`]: PNG-encode the preview and base64-wrap both artifacts

pub mod dates;
pub mod document;
pub mod encode;
pub mod fonts;
pub mod layout;
pub mod markup;
pub mod render;
pub mod schema;
pub mod template;
