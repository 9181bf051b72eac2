//! Test doubles shared by the agent tests

use async_trait::async_trait;
use deepthink_llm::{CompletionRequest, CompletionResponse, LLMProvider};

mockall::mock! {
    pub Provider {}

    #[async_trait]
    impl LLMProvider for Provider {
        async fn complete(&self, request: CompletionRequest) -> deepthink_llm::Result<CompletionResponse>;
        fn name(&self) -> &str;
    }
}
