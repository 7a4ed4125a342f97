//! Transport seam: physical endpoints bound to resolved URIs.
//!
//! The core never opens sockets itself. A [`Transport`] turns a
//! [`PhysicalUri`] into a [`PhysicalEndpoint`], which in turn hands out a
//! send-side processor and receive-side consumers.

use std::sync::Arc;

use async_trait::async_trait;
use knative_env::PhysicalUri;

use crate::error::KnativeResult;
use crate::processor::Processor;

/// Factory for physical endpoints.
pub trait Transport: Send + Sync {
    fn endpoint(&self, uri: &PhysicalUri) -> KnativeResult<Arc<dyn PhysicalEndpoint>>;
}

/// A physical resource bound to one address.
///
/// `start` must precede any use of its producers or consumers; `stop`
/// releases whatever `start` acquired.
#[async_trait]
pub trait PhysicalEndpoint: Send + Sync {
    fn uri(&self) -> &PhysicalUri;

    async fn start(&self) -> KnativeResult<()>;

    async fn stop(&self) -> KnativeResult<()>;

    /// Send-side step. Its output is the reply from the remote consumer.
    fn create_producer(&self) -> KnativeResult<Arc<dyn Processor>>;

    /// Receive-side handle feeding inbound messages into `processor`.
    fn create_consumer(&self, processor: Arc<dyn Processor>) -> KnativeResult<Box<dyn Consumer>>;
}

/// A started consumer receives messages until stopped.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn start(&self) -> KnativeResult<()>;

    async fn stop(&self) -> KnativeResult<()>;
}
