use url::form_urlencoded;

pub const PAGE_SIZE: u32 = 25;

/// Offset/limit slice of the ordered result set for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

impl PageWindow {
    /// `page` is 1-indexed; the compiler rejects anything below 1.
    pub fn for_page(page: u32) -> Self {
        let page = page.max(1) as i64;
        Self {
            offset: (page - 1) * PAGE_SIZE as i64,
            limit: PAGE_SIZE as i64,
        }
    }
}

pub fn last_page(count: u64) -> u32 {
    let pages = count.div_ceil(PAGE_SIZE as u64).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl PageLinks {
    /// Builds request-relative links for the neighbouring pages. `params` is the
    /// original query string as decoded pairs; only `page` is rewritten.
    pub fn build(path: &str, params: &[(String, String)], page: u32, count: u64) -> Self {
        let last = last_page(count);

        let next = if (page as u64) * (PAGE_SIZE as u64) < count {
            Some(page_url(path, params, Some(page + 1)))
        } else {
            None
        };

        let previous = if page > 1 {
            let target = (page - 1).min(last);
            if target == 1 {
                Some(page_url(path, params, None))
            } else {
                Some(page_url(path, params, Some(target)))
            }
        } else {
            None
        };

        Self { next, previous }
    }
}

fn page_url(path: &str, params: &[(String, String)], page: Option<u32>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params.iter().filter(|(name, _)| name != "page") {
        serializer.append_pair(name, value);
    }
    if let Some(page) = page {
        serializer.append_pair("page", &page.to_string());
    }

    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}
