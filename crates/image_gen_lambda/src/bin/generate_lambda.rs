use aws_config::{BehaviorVersion, Region};
use image_gen_lambda::adapters::model_service::BedrockImageModel;
use image_gen_lambda::adapters::object_store::{ArtifactStore, S3ArtifactStore};
use image_gen_lambda::config::GenerateConfig;
use image_gen_lambda::edge::ApiGatewayResponse;
use image_gen_lambda::handlers::generate::handle_generate_event;
use image_gen_lambda::telemetry;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct RuntimeDependencies {
    config: GenerateConfig,
    model: BedrockImageModel,
    store: Option<S3ArtifactStore>,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    let store = deps.store.as_ref().map(|store| store as &dyn ArtifactStore);
    Ok(handle_generate_event(event.payload, &deps.config, &deps.model, store).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = GenerateConfig::from_env()?;
    telemetry::init(&config.log_level);

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let bedrock_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.bedrock_region.clone()))
        .load()
        .await;

    let deps = RuntimeDependencies {
        model: BedrockImageModel::new(
            aws_sdk_bedrockruntime::Client::new(&bedrock_config),
            config.model_id.clone(),
        ),
        store: config
            .bucket
            .as_ref()
            .map(|bucket| S3ArtifactStore::new(bucket, aws_sdk_s3::Client::new(&aws_config))),
        config,
    };
    tracing::info!(
        component = "generate_lambda",
        event = "cold_start",
        model_id = deps.model.model_id(),
        storage_enabled = deps.store.is_some()
    );

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
