//! The completion client. Wraps provider adapters with rate limit
//! retries, validation of required function calls with one corrective
//! retry, argument cleanup, and per-attempt cost accounting.

use std::sync::Arc;

use indoc::formatdoc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accounting::{estimate_cost, normalize_usage, CostEntry, CostSink, NoopSink, Pricing};
use crate::errors::ProviderError;
use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;
use crate::providers::base::{CompletionOptions, ModelTier, Provider, Usage};
use crate::providers::factory::ProviderRegistry;
use crate::providers::retry::{with_retries, RetryConfig};
use crate::unescape::unescape_arguments;
use crate::validation::{validate_call, CallValidation};

/// Which function a corrective retry steers to when the model keeps
/// failing a surgical edit call.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    pub patch_function: String,
    pub full_update_function: String,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            patch_function: "patch_file".to_string(),
            full_update_function: "update_file".to_string(),
        }
    }
}

/// A completed generation with its accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: Message,
    pub usage: Usage,
    pub cost: f64,
}

pub struct Client {
    registry: ProviderRegistry,
    retry: RetryConfig,
    pricing: Pricing,
    sink: Arc<dyn CostSink>,
    cancel: CancellationToken,
    recovery: RecoveryPolicy,
}

impl Client {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            retry: RetryConfig::default(),
            pricing: Pricing::default(),
            sink: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
            recovery: RecoveryPolicy::default(),
        }
    }

    /// A client over a single provider, used as the default
    pub fn with_provider(provider: Arc<dyn Provider>) -> Self {
        Self::new(ProviderRegistry::single(provider))
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_cost_sink(mut self, sink: Arc<dyn CostSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_recovery_policy(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Cancelling this token aborts in-flight requests and backoff waits
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generate the next message for the conversation.
    ///
    /// The conversation is borrowed mutably: when a required function
    /// call comes back malformed, the bad reply and a corrective user
    /// turn are appended before the retry, and they stay appended
    /// whether or not the retry succeeds.
    pub async fn complete(
        &self,
        conversation: &mut Vec<Message>,
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let provider = self.registry.resolve(options.service)?;
        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            provider = %provider.kind(),
            tier = ?options.tier,
            "starting completion"
        );

        let (message, usage, cost) = self
            .attempt(&provider, conversation.as_slice(), tools, options)
            .await?;

        let Some(required) = options.tool_choice.required_name() else {
            return Ok(self.finish(message, usage, cost));
        };
        let Some(problems) = self.check_result(&message, tools) else {
            return Ok(self.finish(message, usage, cost));
        };

        // one corrective retry: show the model its reply and what was
        // wrong with it, escalate bargain tiers, and require the call
        // again
        warn!(
            %request_id,
            function = required,
            ?problems,
            "required call failed validation"
        );
        let retry_target = self.retry_target(required, tools);
        conversation.push(message);
        conversation.push(Self::corrective_message(required, &retry_target, &problems));

        let retry_options = options
            .clone()
            .with_tier(options.tier.escalated())
            .require_tool(retry_target.clone());
        let (message, usage, cost) = self
            .attempt(&provider, conversation.as_slice(), tools, &retry_options)
            .await?;

        if let Some(problems) = self.check_result(&message, tools) {
            warn!(
                %request_id,
                function = %retry_target,
                ?problems,
                "corrective retry failed validation"
            );
            return Err(ProviderError::RecoveryFailed(problems.join("; ")));
        }

        Ok(self.finish(message, usage, cost))
    }

    /// One provider call behind the rate limit retry loop. Usage and cost
    /// are recorded for every attempt that returns, including a reply a
    /// later validation pass rejects.
    async fn attempt(
        &self,
        provider: &Arc<dyn Provider>,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage, f64), ProviderError> {
        let (message, raw_usage) = with_retries(&self.retry, &self.cancel, || {
            provider.complete(messages, tools, options)
        })
        .await?;

        let usage = normalize_usage(provider.kind(), &raw_usage);
        let cost = estimate_cost(
            &usage,
            &self.pricing.rates(provider.kind()),
            options.tier == ModelTier::Cheap,
        );
        self.sink.record(&CostEntry {
            provider: provider.kind(),
            tier: options.tier,
            usage: usage.clone(),
            cost,
        });
        debug!(provider = %provider.kind(), cost, "recorded completion attempt");

        Ok((message, usage, cost))
    }

    /// None means the reply is acceptable; Some carries the problems to
    /// tell the model about.
    fn check_result(&self, message: &Message, tools: &[Tool]) -> Option<Vec<String>> {
        let requests = message.tool_requests();
        // replies with several calls carry their own structure; no single
        // declaration to validate them against
        if requests.len() > 1 {
            return None;
        }
        match requests.first() {
            Some(request) => match &request.tool_call {
                Ok(call) => match validate_call(call, tools) {
                    CallValidation::Valid | CallValidation::UnknownFunction => None,
                    CallValidation::Invalid(problems) => Some(problems),
                },
                Err(e) => Some(vec![e.to_string()]),
            },
            None => Some(vec!["no function call was produced".to_string()]),
        }
    }

    /// The function the corrective retry should require. A failing
    /// surgical edit is steered to the full rewrite when that tool is
    /// declared.
    fn retry_target(&self, required: &str, tools: &[Tool]) -> String {
        if required == self.recovery.patch_function
            && tools
                .iter()
                .any(|t| t.name == self.recovery.full_update_function)
        {
            self.recovery.full_update_function.clone()
        } else {
            required.to_string()
        }
    }

    fn corrective_message(required: &str, retry_target: &str, problems: &[String]) -> Message {
        let problem_list = problems
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        let text = formatdoc! {"
            Your previous reply did not include a valid call to the {required} function:
            {problem_list}

            Respond again with a single valid call to the {retry_target} function, and no other content."
        };
        Message::user().with_text(text)
    }

    /// Apply argument cleanup to the winning reply
    fn finish(&self, mut message: Message, usage: Usage, cost: f64) -> Completion {
        for content in &mut message.content {
            if let MessageContent::ToolRequest(request) = content {
                if let Ok(call) = &mut request.tool_call {
                    unescape_arguments(&mut call.arguments);
                }
            }
        }
        Completion {
            message,
            usage,
            cost,
        }
    }
}
