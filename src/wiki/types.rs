use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub query: Option<QueryBody>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    pub extract: Option<String>,
    pub fullurl: Option<String>,
    #[serde(default)]
    pub langlinks: Vec<LangLink>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl PageInfo {
    pub fn exists(&self) -> bool {
        !self.missing && !self.invalid
    }
}

#[derive(Debug, Deserialize)]
pub struct LangLink {
    pub lang: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<String>,
    pub info: Option<String>,
}

/// A resolved page with its intro summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
    pub title: String,
    pub url: String,
    pub summary: String,
}
