use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "quill-server",
    description = "Emotion detection, grammar correction, summarization, paraphrasing and image generation over hosted models",
    version = "0.1.0",
    contact(name = "quill", url = "https://github.com/Cyberhan123/quill")
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}
