use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::books::home,
        api::books::book_detail,
    ),
    tags(
        (name = "bookworm", description = "Bookworm catalog API")
    )
)]
pub struct ApiDoc;
