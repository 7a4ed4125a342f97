//! The pipeline seam: processing steps the core splices in front of and
//! behind the physical transport.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::KnativeResult;
use crate::message::Message;

/// A single processing step.
///
/// Implementations must not keep per-call mutable state outside the message:
/// the same processor is invoked concurrently for unrelated messages.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Transform `message`, returning the message handed to the next step
    /// (or, for the last step, the reply).
    async fn process(&self, message: Message) -> KnativeResult<Message>;
}

/// Ordered chain of processors; the output of each step feeds the next.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Processor>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Arc<dyn Processor>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl Processor for Pipeline {
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        let mut current = message;
        for step in &self.steps {
            current = step.process(current).await?;
        }
        Ok(current)
    }
}

/// Adapter turning a synchronous closure into a [`Processor`].
pub struct FnProcessor<F>(F);

#[async_trait]
impl<F> Processor for FnProcessor<F>
where
    F: Fn(Message) -> KnativeResult<Message> + Send + Sync,
{
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        (self.0)(message)
    }
}

/// Wrap a closure as a shareable processor.
pub fn processor_fn<F>(f: F) -> Arc<dyn Processor>
where
    F: Fn(Message) -> KnativeResult<Message> + Send + Sync + 'static,
{
    Arc::new(FnProcessor(f))
}
