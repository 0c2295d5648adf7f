//! Pagination: page/per_page parameters, limit/offset windows, and the
//! `X-total-count` / `Link` response headers.

use std::borrow::Cow;

pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Limit/offset window handed to the storage engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    /// `None` when paging is disabled (`per_page=0`).
    pub per_page: Option<u64>,
}

impl PageParams {
    pub fn window(&self) -> Option<PageWindow> {
        self.per_page.map(|size| PageWindow {
            limit: size,
            offset: (self.page.saturating_sub(1)) * size,
        })
    }
}

/// Resolve page parameters from the query string. The route's items-per-page
/// applies when the query does not override it; zero disables paging.
pub fn page_params(
    page: Option<&str>,
    per_page: Option<&str>,
    route_default: Option<u64>,
) -> PageParams {
    let page = page
        .and_then(|p| p.parse::<u64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let size = per_page
        .and_then(|p| p.parse::<u64>().ok())
        .or(route_default)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    PageParams {
        page,
        per_page: (size > 0).then_some(size),
    }
}

/// Header outcome for a paged list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageHeaders {
    /// The requested page lies past the last page.
    NoContent,
    Emit { total: u64, link: Option<String> },
}

/// Compute the count/link headers for a list response. The `Link` header is
/// only produced while paging is active; `X-total-count` always is.
pub fn pagination_headers(
    total: u64,
    params: &PageParams,
    path: &str,
    query: &[(String, String)],
) -> PageHeaders {
    let Some(per_page) = params.per_page else {
        return PageHeaders::Emit { total, link: None };
    };

    let last = if total == 0 { 1 } else { total.div_ceil(per_page) };
    if params.page > last {
        return PageHeaders::NoContent;
    }

    let mut rels: Vec<(u64, &str)> = Vec::new();
    if params.page != last {
        rels.push((params.page + 1, "next"));
        rels.push((last, "last"));
    }
    if params.page > 1 {
        rels.push((1, "first"));
        rels.push((params.page - 1, "prev"));
    }

    let link = (!rels.is_empty()).then(|| {
        rels.iter()
            .map(|(page, rel)| {
                format!("<{}>; rel={}", page_url(path, query, *page, per_page), rel)
            })
            .collect::<Vec<_>>()
            .join(",")
    });

    PageHeaders::Emit { total, link }
}

fn page_url(path: &str, query: &[(String, String)], page: u64, per_page: u64) -> String {
    let mut pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = query
        .iter()
        .filter(|(k, _)| k != "page" && k != "per_page")
        .map(|(k, v)| (Cow::Borrowed(k.as_str()), Cow::Borrowed(v.as_str())))
        .collect();
    pairs.push((Cow::Borrowed("page"), Cow::Owned(page.to_string())));
    pairs.push((Cow::Borrowed("per_page"), Cow::Owned(per_page.to_string())));

    let query_string = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query_string}")
}

/// Percent-encode the characters that break a query component; everything
/// else passes through.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'['
            | b']' | b',' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: u64, per_page: u64) -> PageParams {
        PageParams { page, per_page: Some(per_page) }
    }

    #[test]
    fn window_offsets_from_page_one() {
        assert_eq!(params(1, 10).window(), Some(PageWindow { limit: 10, offset: 0 }));
        assert_eq!(params(3, 10).window(), Some(PageWindow { limit: 10, offset: 20 }));
    }

    #[test]
    fn defaults_apply_and_zero_disables() {
        assert_eq!(
            page_params(None, None, None),
            PageParams { page: 1, per_page: Some(25) }
        );
        assert_eq!(
            page_params(Some("2"), None, Some(50)),
            PageParams { page: 2, per_page: Some(50) }
        );
        assert_eq!(page_params(None, Some("0"), None).per_page, None);
        assert_eq!(page_params(Some("junk"), Some("junk"), None).page, 1);
    }

    #[test]
    fn first_page_links_forward_only() {
        let headers = pagination_headers(23, &params(1, 10), "/respondents", &[]);
        let PageHeaders::Emit { total, link } = headers else {
            panic!("expected headers");
        };
        assert_eq!(total, 23);
        let link = link.unwrap();
        assert!(link.contains("</respondents?page=2&per_page=10>; rel=next"));
        assert!(link.contains("</respondents?page=3&per_page=10>; rel=last"));
        assert!(!link.contains("rel=prev"));
    }

    #[test]
    fn last_page_links_backward_only() {
        let headers = pagination_headers(23, &params(3, 10), "/respondents", &[]);
        let PageHeaders::Emit { link, .. } = headers else {
            panic!("expected headers");
        };
        let link = link.unwrap();
        assert!(link.contains("rel=first"));
        assert!(link.contains("</respondents?page=2&per_page=10>; rel=prev"));
        assert!(!link.contains("rel=next"));
    }

    #[test]
    fn past_the_last_page_is_no_content() {
        assert_eq!(
            pagination_headers(23, &params(4, 10), "/respondents", &[]),
            PageHeaders::NoContent
        );
    }

    #[test]
    fn filters_survive_in_link_urls() {
        let query = vec![
            ("status".to_string(), "[open,closed]".to_string()),
            ("page".to_string(), "1".to_string()),
        ];
        let headers = pagination_headers(30, &params(1, 10), "/tokens", &query);
        let PageHeaders::Emit { link, .. } = headers else {
            panic!("expected headers");
        };
        assert!(link.unwrap().contains("status=[open,closed]&page=2&per_page=10"));
    }

    #[test]
    fn disabled_paging_still_reports_total() {
        let headers = pagination_headers(
            5,
            &PageParams { page: 1, per_page: None },
            "/tokens",
            &[],
        );
        assert_eq!(headers, PageHeaders::Emit { total: 5, link: None });
    }
}
