/// Database models
///
/// Each model owns its table's queries as associated functions taking a
/// `&PgPool`. Multi-table state changes that move stock live in
/// [`crate::inventory`].
///
/// - [`user`]: accounts and roles
/// - [`product`]: stock counters and derived stock status
/// - [`reservation`]: holds against product stock
/// - [`post`]: lost & found feed with likes, comments and claims
/// - [`refresh_token`]: hashed refresh tokens

pub mod post;
pub mod product;
pub mod refresh_token;
pub mod reservation;
pub mod user;
