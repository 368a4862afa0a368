//! One generation attempt: validate, spend a credit, call the backend, keep the result.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::API_KEY_ENV,
    error::{GenerateError, ScenaristError},
    gemini::GenerativeBackend,
    quota::QuotaService,
    types::{Attachment, GenerateInput, GenerateOptions, GenerateRequest, GenerateResult, Limits},
};

/// Returned by the service when the key's project cannot see the model.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found.";

pub struct Orchestrator {
    backend: Arc<dyn GenerativeBackend>,
    quota: QuotaService,
    credential_selected: bool,
    current: Option<GenerateResult>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn GenerativeBackend>, quota: QuotaService) -> Self {
        Self {
            backend,
            quota,
            credential_selected: true,
            current: None,
        }
    }

    /// Run a single request/response cycle. There are no retries: any failure ends
    /// the attempt, and a credit spent on a failed call is not returned.
    pub async fn generate(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        options: GenerateOptions,
    ) -> Result<&GenerateResult, GenerateError> {
        check_brief(text, attachments.len())?;

        self.current = None;

        let allowed = self.quota.consume_credit().map_err(|e| GenerateError::Service {
            message: format!("Failed to update usage state: {}", e),
        })?;
        if !allowed {
            info!("Generation refused, daily limit reached");
            return Err(GenerateError::LimitExceeded);
        }

        let request = GenerateRequest {
            input: GenerateInput {
                text: text.trim().to_string(),
                attachments,
            },
            options,
        };

        match self.backend.generate_scenario(&request).await {
            Ok(result) => {
                info!(
                    shots = result.shots.len(),
                    thumbnails = result.thumbnail_ideas.len(),
                    "Scenario generated"
                );
                Ok(self.current.insert(result))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, error: ScenaristError) -> GenerateError {
        let message = error.to_string();
        warn!(%message, "Generation failed");

        if message.contains(ENTITY_NOT_FOUND) {
            self.credential_selected = false;
        }

        GenerateError::Service {
            message: user_message(&message),
        }
    }

    /// False after the service reported that the key cannot reach the model.
    pub fn credential_selected(&self) -> bool {
        self.credential_selected
    }

    /// Mark a fresh credential as chosen.
    pub fn select_credential(&mut self) {
        self.credential_selected = true;
    }

    pub fn current_result(&self) -> Option<&GenerateResult> {
        self.current.as_ref()
    }

    pub fn limits(&self) -> crate::error::Result<Limits> {
        self.quota.status()
    }
}

/// A brief needs some text or at least one attachment.
pub fn check_brief(text: &str, attachment_count: usize) -> Result<(), GenerateError> {
    if text.trim().is_empty() && attachment_count == 0 {
        Err(GenerateError::EmptyInput)
    } else {
        Ok(())
    }
}

/// Key problems get a configuration hint; everything else is shown verbatim.
pub fn user_message(raw: &str) -> String {
    if raw.contains("API key") {
        format!(
            "API key problem: check that {} holds a valid key ({})",
            API_KEY_ENV, raw
        )
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::Result,
        quota::tests::memory_quota,
        types::{ChatTurn, ImageData},
    };

    struct FakeBackend {
        calls: AtomicUsize,
        reply: Mutex<std::result::Result<GenerateResult, (u16, String)>>,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl FakeBackend {
        fn ok(result: GenerateResult) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Mutex::new(Ok(result)),
                last_request: Mutex::new(None),
            })
        }

        fn failing(status: u16, message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Mutex::new(Err((status, message.to_string()))),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl GenerativeBackend for FakeBackend {
        async fn generate_scenario(&self, request: &GenerateRequest) -> Result<GenerateResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.reply
                .lock()
                .unwrap()
                .clone()
                .map_err(|(status, message)| ScenaristError::ApiError { status, message })
        }

        async fn generate_thumbnail(&self, _idea: &str) -> Result<ImageData> {
            Err(ScenaristError::NoImage)
        }

        async fn chat(&self, _system: &str, _history: &[ChatTurn]) -> Result<String> {
            Ok(String::new())
        }
    }

    fn sample() -> GenerateResult {
        GenerateResult {
            script_markdown: "HOOK: look at this".to_string(),
            thumbnail_ideas: vec!["Shocked face".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_input_never_reaches_the_service() {
        let backend = FakeBackend::ok(sample());
        let (quota, _) = memory_quota(2);
        let mut orchestrator = Orchestrator::new(backend.clone(), quota.clone());

        let err = orchestrator
            .generate("   ", Vec::new(), GenerateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, GenerateError::EmptyInput);
        assert!(!err.to_string().is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(quota.status().unwrap().used_today, 0);
    }

    #[tokio::test]
    async fn attachments_alone_are_enough() {
        let backend = FakeBackend::ok(sample());
        let (quota, _) = memory_quota(2);
        let mut orchestrator = Orchestrator::new(backend.clone(), quota);

        let attachment = Attachment {
            name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            data_base64: "AAAA".to_string(),
        };
        let result = orchestrator
            .generate("", vec![attachment.clone()], GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.script_markdown, "HOOK: look at this");
        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.input.attachments, vec![attachment]);
        assert_eq!(orchestrator.current_result(), Some(&sample()));
    }

    #[tokio::test]
    async fn third_request_hits_the_daily_limit() {
        let backend = FakeBackend::ok(sample());
        let (quota, _) = memory_quota(2);
        let mut orchestrator = Orchestrator::new(backend.clone(), quota);

        for _ in 0..2 {
            orchestrator
                .generate("coffee grinder", Vec::new(), GenerateOptions::default())
                .await
                .unwrap();
        }
        let err = orchestrator
            .generate("coffee grinder", Vec::new(), GenerateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, GenerateError::LimitExceeded);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(orchestrator.current_result().is_none());
        assert_eq!(orchestrator.limits().unwrap().remaining_today, 0);
    }

    #[tokio::test]
    async fn entity_not_found_drops_the_credential() {
        let backend = FakeBackend::failing(404, ENTITY_NOT_FOUND);
        let (quota, _) = memory_quota(2);
        let mut orchestrator = Orchestrator::new(backend, quota.clone());
        assert!(orchestrator.credential_selected());

        let err = orchestrator
            .generate("topic", Vec::new(), GenerateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerateError::Service { ref message } if message.contains(ENTITY_NOT_FOUND)));
        assert!(!orchestrator.credential_selected());
        // The credit is spent even though the call failed.
        assert_eq!(quota.status().unwrap().used_today, 1);

        orchestrator.select_credential();
        assert!(orchestrator.credential_selected());
    }

    #[tokio::test]
    async fn other_failures_keep_the_credential_and_message() {
        let backend = FakeBackend::failing(500, "backend exploded");
        let (quota, _) = memory_quota(2);
        let mut orchestrator = Orchestrator::new(backend, quota);

        let err = orchestrator
            .generate("topic", Vec::new(), GenerateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GenerateError::Service {
                message: "Gemini API returned 500: backend exploded".to_string()
            }
        );
        assert!(orchestrator.credential_selected());
    }

    #[test]
    fn brief_needs_text_or_attachments() {
        assert_eq!(check_brief("", 0), Err(GenerateError::EmptyInput));
        assert_eq!(check_brief(" \n\t", 0), Err(GenerateError::EmptyInput));
        assert_eq!(check_brief("", 1), Ok(()));
        assert_eq!(check_brief("espresso", 0), Ok(()));
    }

    #[test]
    fn api_key_failures_are_rewritten() {
        let message = user_message("Gemini API returned 400: API key not valid.");
        assert!(message.starts_with("API key problem"));
        assert!(message.contains(API_KEY_ENV));
        assert_eq!(user_message("timeout"), "timeout");
    }
}
