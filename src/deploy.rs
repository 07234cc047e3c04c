use tracing::info;

use crate::elastic::{DeploymentStatus, ElasticClient, ElasticError};

#[derive(Debug, PartialEq, Eq)]
pub struct DeployOutcome {
    pub deployment: DeploymentStatus,
    pub inference_created: bool,
}

/// Starts the embedding model and makes sure an inference endpoint serves it.
/// Both steps are idempotent.
pub async fn deploy_model(
    es: &ElasticClient,
    model_id: &str,
    inference_id: &str,
) -> Result<DeployOutcome, ElasticError> {
    info!(model_id, "starting model deployment");
    let deployment = es.start_deployment(model_id).await?;

    let inference_created = if es.inference_exists(inference_id).await? {
        info!(inference_id, "inference endpoint already present");
        false
    } else {
        es.put_text_embedding_inference(inference_id, model_id).await?;
        info!(inference_id, "inference endpoint created");
        true
    };

    Ok(DeployOutcome {
        deployment,
        inference_created,
    })
}

pub fn format_outcome(outcome: &DeployOutcome, model_id: &str, inference_id: &str) -> String {
    let deployment = match outcome.deployment {
        DeploymentStatus::Started => "started",
        DeploymentStatus::AlreadyStarted => "already started",
    };
    let endpoint = if outcome.inference_created {
        "created"
    } else {
        "already present"
    };
    format!("Model {model_id}: {deployment}\nInference endpoint {inference_id}: {endpoint}\n")
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn creates_missing_inference_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_ml/trained_models/.multilingual-e5-small/deployment/_start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"assignment": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_inference/e5-endpoint"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/_inference/text_embedding/e5-endpoint"))
            .and(body_partial_json(json!({
                "service": "elasticsearch",
                "service_settings": {"model_id": ".multilingual-e5-small"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inference_id": "e5-endpoint"})))
            .expect(1)
            .mount(&server)
            .await;

        let es = ElasticClient::with_base_url(Client::new(), &server.uri());
        let outcome = deploy_model(&es, ".multilingual-e5-small", "e5-endpoint")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DeployOutcome {
                deployment: DeploymentStatus::Started,
                inference_created: true
            }
        );
    }

    #[tokio::test]
    async fn existing_endpoint_left_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"type": "status_exception", "reason": "model already started"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_inference/e5-endpoint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"endpoints": []})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let es = ElasticClient::with_base_url(Client::new(), &server.uri());
        let outcome = deploy_model(&es, ".multilingual-e5-small", "e5-endpoint")
            .await
            .unwrap();
        assert_eq!(outcome.deployment, DeploymentStatus::AlreadyStarted);
        assert!(!outcome.inference_created);

        let text = format_outcome(&outcome, ".multilingual-e5-small", "e5-endpoint");
        assert!(text.contains("already started"));
        assert!(text.contains("already present"));
    }
}
