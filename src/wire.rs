//! Shapes of the NetBackup REST responses the core decodes. NetBackup's API
//! follows a JSON:API-flavoured envelope: a `data` array of resources and a
//! `meta.pagination` block carrying the next offset.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: Vec<Resource<T>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
pub struct Resource<T> {
    pub attributes: T,
}

#[derive(Debug, Deserialize)]
pub struct Meta {
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    /// Next page's offset. `None`/absent means there is no next page.
    #[serde(default)]
    pub next: Option<u64>,
    /// Offset of the last page. Spec §9 open question (a): a response can
    /// report `next == 0` when a page is both first and last, so pagination
    /// must terminate on `offset == last`, never on `next == 0` alone.
    pub last: u64,
}
