/// Product catalogue and stock endpoints
///
/// Every product response carries the derived `status` (`available`, `low` or
/// `out`), computed from the stock levels at read time.
///
/// # Endpoints
///
/// - `GET /v1/products` - List with filters
/// - `POST /v1/products` - Create (staff+)
/// - `GET /v1/products/:id` - Detail with pending quantity
/// - `PATCH /v1/products/:id` - Update metadata (staff+)
/// - `DELETE /v1/products/:id` - Delete (staff+)
/// - `POST /v1/products/:id/restock` - Add units (staff+)
/// - `POST /v1/products/:id/write-off` - Remove damaged units (staff+)
/// - `GET /v1/products/:id/reservations` - Reservers of a product (staff+)

use super::{non_blank, Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use campushub_shared::{
    auth::{authorization::require_staff, middleware::AuthContext},
    models::{
        product::{
            CreateProduct, DeleteOutcome, Product, ProductFilter, StockChange, StockStatus,
            UpdateProduct,
        },
        reservation::{Reservation, ReservationDetail, ReservationStatus},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Product with its derived status
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub status: StockStatus,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let status = product.status();
        Self { product, status }
    }
}

/// Product detail
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductView,

    /// Units held by pending reservations
    pub pending_quantity: i64,
}

/// `GET /v1/products` query
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    pub status: Option<StockStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListProductsQuery {
    fn split(self) -> (ProductFilter, Pagination) {
        (
            ProductFilter {
                category: self.category,
                status: self.status,
                search: self.search,
            },
            Pagination {
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    #[validate(length(max = 2048, message = "Image URL must be at most 2048 characters"))]
    pub image_url: Option<String>,

    #[validate(range(min = 0, max = 100000, message = "Total stock must be between 0 and 100000"))]
    pub total_stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: Option<String>,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    #[validate(length(max = 2048, message = "Image URL must be at most 2048 characters"))]
    pub image_url: Option<String>,
}

/// Restock / write-off body
#[derive(Debug, Deserialize, Validate)]
pub struct StockQuantityRequest {
    #[validate(range(min = 1, max = 100000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationStatusQuery {
    pub status: Option<ReservationStatus>,
}

fn product_not_found() -> ApiError {
    ApiError::NotFound("Product not found".to_string())
}

/// Lists products
///
/// # Endpoint
///
/// ```text
/// GET /v1/products?category=laptops&status=low&search=dell&limit=20&offset=0
/// ```
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Json<Page<ProductView>>> {
    let (filter, page) = query.split();

    let products = Product::list(&state.db, &filter, page.limit(), page.offset()).await?;
    let total = Product::count(&state.db, &filter).await?;

    Ok(Json(Page::new(
        products.into_iter().map(ProductView::from).collect(),
        total,
        page,
    )))
}

/// Creates a product, fully in stock
///
/// # Response
///
/// `201 Created` with the product.
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductView>)> {
    require_staff(&auth)?;
    req.validate()?;

    let product = Product::create(
        &state.db,
        CreateProduct {
            name: req.name.trim().to_string(),
            description: non_blank(req.description),
            category: req.category.trim().to_string(),
            location: non_blank(req.location),
            image_url: non_blank(req.image_url),
            total_stock: req.total_stock,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    tracing::info!(product_id = %product.id, created_by = %auth.user_id, "Product created");

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// Product detail
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<ProductDetail>> {
    let product = Product::find_by_id(&state.db, product_id)
        .await?
        .ok_or_else(product_not_found)?;

    let pending_quantity = Reservation::pending_quantity_for_product(&state.db, product_id).await?;

    Ok(Json(ProductDetail {
        product: product.into(),
        pending_quantity,
    }))
}

/// Updates product metadata
pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<ProductView>> {
    require_staff(&auth)?;
    req.validate()?;

    let product = Product::update_details(
        &state.db,
        product_id,
        UpdateProduct {
            name: non_blank(req.name),
            description: req.description.map(|d| d.trim().to_string()),
            category: non_blank(req.category),
            location: req.location.map(|l| l.trim().to_string()),
            image_url: req.image_url.map(|u| u.trim().to_string()),
        },
    )
    .await?
    .ok_or_else(product_not_found)?;

    Ok(Json(product.into()))
}

/// Deletes a product
///
/// # Errors
///
/// - `404 Not Found`: No such product
/// - `409 Conflict`: Pending reservations still hold its stock
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_staff(&auth)?;

    match Product::delete(&state.db, product_id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(product_id = %product_id, deleted_by = %auth.user_id, "Product deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(product_not_found()),
        DeleteOutcome::HasPendingReservations(count) => Err(ApiError::Conflict(format!(
            "Product has {} pending reservation(s); cancel or collect them first",
            count
        ))),
    }
}

/// Puts units on the shelf
pub async fn restock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<StockQuantityRequest>,
) -> ApiResult<Json<ProductView>> {
    require_staff(&auth)?;
    req.validate()?;

    let product = Product::restock(&state.db, product_id, req.quantity)
        .await?
        .ok_or_else(product_not_found)?;

    tracing::info!(
        product_id = %product.id,
        quantity = req.quantity,
        current_stock = product.current_stock,
        "Product restocked"
    );

    Ok(Json(product.into()))
}

/// Removes damaged or lost units
///
/// # Errors
///
/// - `409 Conflict`: Fewer units on the shelf than `quantity`
pub async fn write_off(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<StockQuantityRequest>,
) -> ApiResult<Json<ProductView>> {
    require_staff(&auth)?;
    req.validate()?;

    match Product::write_off(&state.db, product_id, req.quantity).await? {
        StockChange::Applied(product) => {
            tracing::info!(
                product_id = %product.id,
                quantity = req.quantity,
                current_stock = product.current_stock,
                "Units written off"
            );
            Ok(Json((*product).into()))
        }
        StockChange::NotFound => Err(product_not_found()),
        StockChange::Insufficient { available } => Err(ApiError::Conflict(format!(
            "Cannot write off {} units; only {} on the shelf",
            req.quantity, available
        ))),
    }
}

/// Reservations of one product, optionally by status
pub async fn product_reservations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ReservationStatusQuery>,
) -> ApiResult<Json<Vec<ReservationDetail>>> {
    require_staff(&auth)?;

    if Product::find_by_id(&state.db, product_id).await?.is_none() {
        return Err(product_not_found());
    }

    let reservations = Reservation::list_by_product(&state.db, product_id, query.status).await?;

    Ok(Json(reservations))
}
