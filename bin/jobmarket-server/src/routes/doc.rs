use utoipa::OpenApi;

use crate::routes::health::HealthApi;
use crate::routes::metrics::MetricsApi;
use crate::routes::postings::PostingsApi;
use crate::routes::predict::PredictApi;
use crate::routes::stats::StatsApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "jobmarket-server",
    description = "Job-market statistics, model metrics and salary prediction API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(HealthApi::openapi());
    root.merge(PostingsApi::openapi());
    root.merge(MetricsApi::openapi());
    root.merge(StatsApi::openapi());
    root.merge(PredictApi::openapi());
    root
}
