use std::fmt;

use crate::types::PodDescriptor;

/// One positional filter of `tail`/`ls`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PodFilter {
    /// Every pod in the namespace (`*`, `all`, or no filter at all).
    All,
    /// Label selector handed to the API server, e.g. `app=web,tier!=db`.
    Label(String),
    /// Pod-name substring, matched client-side.
    Name(String),
}

impl PodFilter {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("all") {
            PodFilter::All
        } else if raw.contains(['=', '!', '(']) {
            PodFilter::Label(raw.to_string())
        } else {
            PodFilter::Name(raw.to_string())
        }
    }

    /// Parses every argument; a wildcard anywhere collapses the set to `All`.
    pub fn parse_all<S: AsRef<str>>(args: &[S]) -> Vec<Self> {
        let mut filters: Vec<Self> = Vec::new();
        for f in args.iter().map(|a| Self::parse(a.as_ref())) {
            if f == PodFilter::All {
                return vec![PodFilter::All];
            }
            if !filters.contains(&f) {
                filters.push(f);
            }
        }
        if filters.is_empty() {
            filters.push(PodFilter::All);
        }
        filters
    }

    pub fn selector(&self) -> &str {
        match self {
            PodFilter::Label(s) => s,
            PodFilter::All | PodFilter::Name(_) => "",
        }
    }

    pub fn matches(&self, pod: &PodDescriptor) -> bool {
        match self {
            PodFilter::Name(sub) => pod.name.contains(sub.as_str()),
            PodFilter::All | PodFilter::Label(_) => true,
        }
    }
}

impl fmt::Display for PodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodFilter::All => f.write_str("*"),
            PodFilter::Label(s) | PodFilter::Name(s) => f.write_str(s),
        }
    }
}
