pub mod product;

pub use product::{AssetKind, Product, ProductBySlugResponse, ProductsPageResponse};
