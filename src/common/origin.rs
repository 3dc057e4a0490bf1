use http::HeaderMap;
use http::header::ORIGIN;

/// Policy applied to the `Origin` header of WebSocket upgrade requests
///
/// Requests without an `Origin` header come from non-browser clients and are
/// always permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept upgrades from any origin
    #[default]
    AllowAny,
    /// Accept only the listed origins (compared ASCII case-insensitively)
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Builds an allow-list policy
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(origins.into_iter().map(Into::into).collect())
    }

    /// Returns whether an upgrade carrying `origin` may proceed
    pub fn permits(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::AllowAny, _) | (_, None) => true,
            (Self::AllowList(allowed), Some(origin)) => {
                allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
            }
        }
    }

    /// Checks the `Origin` header of a request
    ///
    /// A header that is present but not valid UTF-8 is never permitted by an
    /// allow-list.
    pub fn permits_headers(&self, headers: &HeaderMap) -> bool {
        match headers.get(ORIGIN) {
            None => self.permits(None),
            Some(value) => match value.to_str() {
                Ok(origin) => self.permits(Some(origin)),
                Err(_) => matches!(self, Self::AllowAny),
            },
        }
    }
}
