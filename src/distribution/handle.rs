//! # Engine Handle
//!
//! Shares one [`ComponentsEngine`] between async callers. A single task owns
//! the engine and drains a command queue, so updates and runs are applied in
//! the order they were sent and a run never observes a half-applied update.
//!
//! The task stops once every handle is dropped and yields the engine back
//! through its `JoinHandle`.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::engine::ComponentsEngine;
use super::errors::{HandleError, HandleResult};
use super::facts::Facts;
use super::types::{ComponentsDistribution, Instance};
use crate::capabilities::Proxemics;
use crate::observability::{log_event_with_fields, Event, MetricsSnapshot};
use crate::restrictions::Restrictions;

enum EngineCommand {
    SetRestrictions(Restrictions),
    SetProxemics(Proxemics),
    SetInstances(Vec<Instance>),
    SetLocalIdentity {
        instance_uuid: String,
        device_uuid: String,
    },
    Run {
        ignore_manual: bool,
        reply: oneshot::Sender<Facts>,
    },
    CurrentDistribution {
        reply: oneshot::Sender<ComponentsDistribution>,
    },
    Metrics {
        reply: oneshot::Sender<MetricsSnapshot>,
    },
}

/// Cloneable front end of an engine task
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Move `engine` onto a tokio task and return a handle to it.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(engine: ComponentsEngine) -> (Self, JoinHandle<ComponentsEngine>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve(engine, receiver));
        (Self { sender }, task)
    }

    pub fn set_restrictions(&self, restrictions: Restrictions) -> HandleResult<()> {
        self.send(EngineCommand::SetRestrictions(restrictions))
    }

    pub fn set_proxemics(&self, proxemics: Proxemics) -> HandleResult<()> {
        self.send(EngineCommand::SetProxemics(proxemics))
    }

    pub fn set_instances(&self, instances: Vec<Instance>) -> HandleResult<()> {
        self.send(EngineCommand::SetInstances(instances))
    }

    pub fn set_local_identity(
        &self,
        instance_uuid: impl Into<String>,
        device_uuid: impl Into<String>,
    ) -> HandleResult<()> {
        self.send(EngineCommand::SetLocalIdentity {
            instance_uuid: instance_uuid.into(),
            device_uuid: device_uuid.into(),
        })
    }

    /// Run the engine after every previously sent update has been applied
    pub async fn run(&self, ignore_manual: bool) -> HandleResult<Facts> {
        let (reply, response) = oneshot::channel();
        self.send(EngineCommand::Run { ignore_manual, reply })?;
        response.await.map_err(|_| HandleError::EngineStopped)
    }

    pub async fn current_distribution(&self) -> HandleResult<ComponentsDistribution> {
        let (reply, response) = oneshot::channel();
        self.send(EngineCommand::CurrentDistribution { reply })?;
        response.await.map_err(|_| HandleError::EngineStopped)
    }

    pub async fn metrics(&self) -> HandleResult<MetricsSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(EngineCommand::Metrics { reply })?;
        response.await.map_err(|_| HandleError::EngineStopped)
    }

    fn send(&self, command: EngineCommand) -> HandleResult<()> {
        self.sender
            .send(command)
            .map_err(|_| HandleError::EngineStopped)
    }
}

async fn serve(
    mut engine: ComponentsEngine,
    mut receiver: mpsc::UnboundedReceiver<EngineCommand>,
) -> ComponentsEngine {
    let mut handled: u64 = 0;
    while let Some(command) = receiver.recv().await {
        handled += 1;
        match command {
            EngineCommand::SetRestrictions(restrictions) => engine.set_restrictions(restrictions),
            EngineCommand::SetProxemics(proxemics) => engine.set_proxemics(proxemics),
            EngineCommand::SetInstances(instances) => engine.set_instances(instances),
            EngineCommand::SetLocalIdentity {
                instance_uuid,
                device_uuid,
            } => engine.set_local_identity(instance_uuid, device_uuid),
            EngineCommand::Run { ignore_manual, reply } => {
                let facts = engine.run(ignore_manual).await;
                // Caller may have given up waiting
                let _ = reply.send(facts);
            }
            EngineCommand::CurrentDistribution { reply } => {
                let _ = reply.send(engine.current_distribution().clone());
            }
            EngineCommand::Metrics { reply } => {
                let _ = reply.send(engine.metrics());
            }
        }
    }

    log_event_with_fields(
        Event::HandleStopped,
        &[
            ("commands", &handled.to_string()),
            ("instance_uuid", engine.local_instance_uuid()),
        ],
    );
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DeviceCapabilities;
    use crate::restrictions::parse_restrictions;
    use serde_json::json;

    #[tokio::test]
    async fn test_updates_apply_before_run() {
        let (handle, task) = EngineHandle::spawn(ComponentsEngine::new("i-1", "d-1"));

        handle
            .set_instances(vec![Instance::new("i-1", "d-1", DeviceCapabilities::new())])
            .unwrap();
        handle
            .set_restrictions(parse_restrictions(&json!({"Player": {"showByDefault": false}})))
            .unwrap();
        let facts = handle.run(false).await.unwrap();

        assert_eq!(facts.halted_by, Some("resolve-automatic"));
        assert_eq!(
            handle.current_distribution().await.unwrap().components["Player"],
            false
        );

        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.metrics().runs, 1);
    }

    #[tokio::test]
    async fn test_clones_share_one_engine() {
        let (handle, task) = EngineHandle::spawn(ComponentsEngine::new("i-1", "d-1"));
        let other = handle.clone();

        handle.run(false).await.unwrap();
        other.run(false).await.unwrap();

        assert_eq!(other.metrics().await.unwrap().runs, 2);
        drop(handle);
        drop(other);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_engine_reports_error() {
        let (handle, task) = EngineHandle::spawn(ComponentsEngine::new("i-1", "d-1"));
        task.abort();
        let _ = task.await;

        assert_eq!(handle.run(false).await.unwrap_err(), HandleError::EngineStopped);
        assert_eq!(
            handle.set_proxemics(Proxemics::new()).unwrap_err(),
            HandleError::EngineStopped
        );
    }
}
