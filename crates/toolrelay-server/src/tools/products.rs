use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use toolrelay_core::Error;
use toolrelay_mcp::{parse_arguments, ToolOutput, ToolRegistry};

/// Client for the product catalog API (`/products` endpoints).
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProductArgs {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PageArgs {
    skip: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CategoryArgs {
    category: String,
    skip: Option<u32>,
    limit: Option<u32>,
}

impl ProductCatalog {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch a single product by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on transport failure or a non-success status.
    pub async fn product(&self, id: u64) -> Result<Value, Error> {
        self.get(&format!("{}/products/{id}", self.base_url), &[])
            .await
    }

    /// Fetch a page of products.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on transport failure or a non-success status.
    pub async fn products(&self, skip: Option<u32>, limit: Option<u32>) -> Result<Value, Error> {
        self.get(&format!("{}/products", self.base_url), &page_query(skip, limit))
            .await
    }

    /// Fetch a page of products in one category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on transport failure or a non-success status.
    pub async fn products_by_category(
        &self,
        category: &str,
        skip: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Value, Error> {
        let url = self.category_url(category)?;
        self.get(url.as_str(), &page_query(skip.or(Some(0)), limit.or(Some(10))))
            .await
    }

    /// `{base}/products/category/{category}` with `category` as one encoded
    /// path segment.
    fn category_url(&self, category: &str) -> Result<reqwest::Url, Error> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Internal(format!("invalid product catalog url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Internal("product catalog url cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["products", "category", category]);
        Ok(url)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        tracing::debug!(url, "product catalog request");
        self.http
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Upstream(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))
    }
}

fn page_query(skip: Option<u32>, limit: Option<u32>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(skip) = skip {
        query.push(("skip", skip.to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

pub(super) fn register(tools: &mut ToolRegistry, catalog: &Arc<ProductCatalog>) {
    let c = Arc::clone(catalog);
    tools.register(
        "fetch_product",
        "Fetches a product by its ID from the product catalog.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "description": "The ID of the product to fetch." }
            },
            "required": ["id"]
        }),
        move |arguments: Value| {
            let catalog = Arc::clone(&c);
            async move {
                let args: ProductArgs = parse_arguments(arguments)?;
                ToolOutput::json(&catalog.product(args.id).await?)
            }
        },
    );

    let c = Arc::clone(catalog);
    tools.register(
        "fetch_products",
        "Fetches a page of products from the product catalog.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "skip": { "type": "integer", "description": "Number of products to skip." },
                "limit": { "type": "integer", "description": "Maximum number of products to return." }
            },
            "required": []
        }),
        move |arguments: Value| {
            let catalog = Arc::clone(&c);
            async move {
                let args: PageArgs = if arguments.is_null() {
                    PageArgs::default()
                } else {
                    parse_arguments(arguments)?
                };
                ToolOutput::json(&catalog.products(args.skip, args.limit).await?)
            }
        },
    );

    let c = Arc::clone(catalog);
    tools.register(
        "fetch_products_by_category",
        "Fetches products in a category from the product catalog.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": { "type": "string", "description": "The category slug." },
                "skip": { "type": "integer", "description": "Number of products to skip. Defaults to 0." },
                "limit": { "type": "integer", "description": "Maximum number of products. Defaults to 10." }
            },
            "required": ["category"]
        }),
        move |arguments: Value| {
            let catalog = Arc::clone(&c);
            async move {
                let args: CategoryArgs = parse_arguments(arguments)?;
                ToolOutput::json(
                    &catalog
                        .products_by_category(&args.category, args.skip, args.limit)
                        .await?,
                )
            }
        },
    );
}
