//! Lifecycle runtime: ordered phase listeners around a component.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::component::KnativeComponent;
use crate::error::KnativeResult;

/// Lifecycle phases, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Starting,
    ConfigureRoutes,
    ConfigureContext,
    Started,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A lifecycle hook. Lower `order` runs first; ties keep registration order.
pub trait Listener: Send + Sync {
    fn order(&self) -> i32 {
        0
    }

    /// Handle `phase`; returns whether the listener acted on it.
    fn accept(&self, phase: Phase, runtime: &Runtime) -> KnativeResult<bool>;
}

type PhaseFn = dyn Fn(&Runtime) -> KnativeResult<()> + Send + Sync;

struct PhaseListener {
    phase: Phase,
    order: i32,
    action: Box<PhaseFn>,
}

impl Listener for PhaseListener {
    fn order(&self) -> i32 {
        self.order
    }

    fn accept(&self, phase: Phase, runtime: &Runtime) -> KnativeResult<bool> {
        if phase != self.phase {
            return Ok(false);
        }
        (self.action)(runtime)?;
        Ok(true)
    }
}

/// Owns a component and drives its listeners through the lifecycle.
pub struct Runtime {
    component: Arc<KnativeComponent>,
    listeners: Vec<Arc<dyn Listener>>,
}

impl Runtime {
    pub fn new(component: Arc<KnativeComponent>) -> Self {
        Self {
            component,
            listeners: Vec::new(),
        }
    }

    pub fn component(&self) -> &Arc<KnativeComponent> {
        &self.component
    }

    pub fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.push(listener);
    }

    /// Register `action` to run in `phase` only.
    pub fn on<F>(&mut self, phase: Phase, order: i32, action: F)
    where
        F: Fn(&Runtime) -> KnativeResult<()> + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(PhaseListener {
            phase,
            order,
            action: Box::new(action),
        }));
    }

    /// Run `Starting`, `ConfigureRoutes` and `ConfigureContext`, start the
    /// component's endpoints, then run `Started`.
    ///
    /// A failing `Started` listener stops the component before the error is
    /// returned.
    pub async fn start(&self) -> KnativeResult<()> {
        self.invoke(Phase::Starting)?;
        self.invoke(Phase::ConfigureRoutes)?;
        self.invoke(Phase::ConfigureContext)?;
        self.component.start().await?;
        if let Err(e) = self.invoke(Phase::Started) {
            if let Err(stop_err) = self.component.stop().await {
                warn!(error = %stop_err, "failed to stop component after start failure");
            }
            return Err(e);
        }
        Ok(())
    }

    pub async fn stop(&self) -> KnativeResult<()> {
        self.invoke(Phase::Stopping)?;
        self.component.stop().await?;
        self.invoke(Phase::Stopped)
    }

    fn invoke(&self, phase: Phase) -> KnativeResult<()> {
        let mut ordered: Vec<(usize, &Arc<dyn Listener>)> =
            self.listeners.iter().enumerate().collect();
        ordered.sort_by_key(|(idx, l)| (l.order(), *idx));
        for (idx, listener) in ordered {
            if listener.accept(phase, self)? {
                info!(phase = %phase, listener = idx, "listener executed");
            }
        }
        Ok(())
    }
}
