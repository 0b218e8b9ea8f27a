use aws_config::{BehaviorVersion, Region};
use image_gen_lambda::adapters::messaging::LineMessagingClient;
use image_gen_lambda::adapters::model_service::BedrockImageModel;
use image_gen_lambda::adapters::object_store::S3ArtifactStore;
use image_gen_lambda::config::{GenerateConfig, LineChannelConfig};
use image_gen_lambda::edge::ApiGatewayResponse;
use image_gen_lambda::handlers::line_webhook::handle_line_webhook_event;
use image_gen_lambda::telemetry;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct RuntimeDependencies {
    config: GenerateConfig,
    channel: LineChannelConfig,
    model: BedrockImageModel,
    store: S3ArtifactStore,
    messenger: LineMessagingClient,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_line_webhook_event(
        event.payload,
        &deps.config,
        &deps.channel,
        &deps.model,
        &deps.store,
        &deps.messenger,
    )
    .await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = GenerateConfig::from_env()?;
    telemetry::init(&config.log_level);
    let channel = LineChannelConfig::from_env()?;
    let bucket = config.require_bucket()?.to_string();

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
        store: S3ArtifactStore::new(bucket, aws_sdk_s3::Client::new(&aws_config)),
        messenger: LineMessagingClient::new(
            reqwest::Client::new(),
            channel.channel_access_token.clone(),
        ),
        channel,
        config,
    };
    tracing::info!(
        component = "line_webhook_lambda",
        event = "cold_start",
        model_id = deps.model.model_id()
    );

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
