use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use scixplain::communicator::{Answer, AskerProfile, Communicator};
use scixplain::datasources::{DatasourceEngine, ResourceUsed};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    question: String,
    age: u32,
    experience: String,
    #[serde(default)]
    config: QuestionConfig,
}

#[derive(Debug, Default, Deserialize)]
struct QuestionConfig {
    #[serde(default)]
    datasources: Vec<DatasourceSelection>,
}

/// Datasources arrive either as `"wiki"` or as `{"engine": "wiki"}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasourceSelection {
    Engine(DatasourceEngine),
    Object { engine: DatasourceEngine },
}

impl QuestionConfig {
    fn engines(&self) -> Vec<DatasourceEngine> {
        self.datasources
            .iter()
            .map(|selection| match selection {
                DatasourceSelection::Engine(engine) => *engine,
                DatasourceSelection::Object { engine } => *engine,
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    markdown: String,
    #[serde(default)]
    references: Vec<String>,
    resources: Vec<ResourceUsed>,
}

impl From<Answer> for QuestionResponse {
    fn from(answer: Answer) -> Self {
        Self {
            markdown: answer.markdown,
            references: answer.references,
            resources: answer.resources,
        }
    }
}

async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    info!(question = %request.question, age = request.age, "received question");

    let engines = request.config.engines();
    let mut communicator = Communicator::new(
        state.provider.clone(),
        state.page_store(&engines),
        state.token_counter.clone(),
        state.communicator.clone(),
        AskerProfile {
            age: request.age,
            experience: request.experience,
        },
    );

    let answer = timeout(state.request_timeout, communicator.ask(&request.question))
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout))??;

    info!(references = answer.references.len(), "answered question");
    Ok(Json(answer.into()))
}

// Canned response for wiring up clients, does not touch the model or the encyclopedia
async fn fixture_handler(Json(request): Json<QuestionRequest>) -> Json<QuestionResponse> {
    info!(question = %request.question, "test request");
    Json(QuestionResponse {
        markdown: format!(
            "# Success!!! \n\n markdown as be updated!!! \n\n ### TestID \n\n {}",
            Uuid::new_v4()
        ),
        references: Vec::new(),
        resources: vec![ResourceUsed {
            url: "https://google/com".to_string(),
            sections: vec!["only one".to_string()],
            references: vec!["https://bing.com".to_string()],
            engine: DatasourceEngine::Wiki,
        }],
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/ask", post(ask_handler))
        .route("/test", post(fixture_handler))
        .with_state(state)
}
