use crate::connection::ConnectionId;
use crate::delivery::{Delivery, Dispatch};
use crate::protocol::{InboundEvent, OutboundEvent};
use rollcall_core::{Principal, Role, RollcallError, RollcallResult};
use rollcall_session::{finalize, AttendanceStore, SessionHandle};
use std::sync::Arc;
use tracing::{info, warn};

/// Decodes inbound frames, authorizes them, applies them to the session,
/// and decides who hears about the result.
pub struct EventDispatcher {
    session: SessionHandle,
    store: Arc<dyn AttendanceStore>,
}

impl EventDispatcher {
    /// Dispatcher over a session actor and the store finalize writes to.
    pub fn new(session: SessionHandle, store: Arc<dyn AttendanceStore>) -> Self {
        Self { session, store }
    }

    /// The session actor events are applied to.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Handle one raw text frame from `principal`.
    ///
    /// Every failure becomes a single `error` unicast back to the sender.
    pub async fn handle(&self, text: &str, principal: &Principal) -> Vec<Dispatch> {
        let result = match InboundEvent::decode(text) {
            Ok(event) => self.handle_event(event, principal).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(dispatches) => dispatches,
            Err(e) => {
                warn!(principal_id = %principal.id, error = %e, "Rejected event");
                vec![Dispatch::unicast(OutboundEvent::error(e.to_string()))]
            }
        }
    }

    /// Role check first, then the session state check, then the mutation.
    pub async fn handle_event(
        &self,
        event: InboundEvent,
        principal: &Principal,
    ) -> RollcallResult<Vec<Dispatch>> {
        authorize(&event, principal)?;

        match event {
            InboundEvent::MarkAttendance(mark) => {
                self.session
                    .mark(mark.student_id.clone(), mark.status)
                    .await?;
                Ok(vec![Dispatch::broadcast(OutboundEvent::MarkAttendance(mark))])
            }
            InboundEvent::RequestSummary => {
                let summary = self.session.snapshot_summary().await?;
                Ok(vec![Dispatch::broadcast(OutboundEvent::Summary(summary))])
            }
            InboundEvent::RequestSelfStatus => {
                let status = self.session.status_of(principal.id.clone()).await?;
                Ok(vec![Dispatch::unicast(OutboundEvent::self_status(status))])
            }
            InboundEvent::Finalize => {
                info!(principal_id = %principal.id, "Finalize requested");
                let report = finalize(&self.session, self.store.as_ref()).await?;
                Ok(vec![Dispatch::broadcast(OutboundEvent::finalize_result(
                    report.summary,
                ))])
            }
        }
    }
}

/// Routes frames from a registered connection through the dispatcher and
/// delivers the results.
pub struct MessageRouter {
    dispatcher: EventDispatcher,
    delivery: Delivery,
}

impl MessageRouter {
    /// Pair a dispatcher with the delivery it fans results out through.
    pub fn new(dispatcher: EventDispatcher, delivery: Delivery) -> Self {
        Self {
            dispatcher,
            delivery,
        }
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Delivery over the connection registry.
    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Handle one frame from a registered connection and deliver the
    /// outcome. Fails only if `connection_id` is not registered.
    pub async fn handle_message(
        &self,
        text: &str,
        connection_id: ConnectionId,
    ) -> RollcallResult<()> {
        let peer = self
            .delivery
            .registry()
            .get(connection_id)
            .await
            .ok_or_else(|| {
                RollcallError::Session(format!("connection {connection_id} is not registered"))
            })?;
        let dispatches = self.dispatcher.handle(text, &peer.principal).await;
        self.delivery.deliver(connection_id, &dispatches).await;
        Ok(())
    }
}

fn authorize(event: &InboundEvent, principal: &Principal) -> RollcallResult<()> {
    let (required, action) = match event {
        InboundEvent::MarkAttendance(_) => (Role::Teacher, "mark attendance"),
        InboundEvent::RequestSummary => (Role::Teacher, "request a summary"),
        InboundEvent::Finalize => (Role::Teacher, "finalize attendance"),
        InboundEvent::RequestSelfStatus => (Role::Student, "request their own status"),
    };
    if principal.role != required {
        return Err(RollcallError::Authorization(format!(
            "only a {required} can {action}"
        )));
    }
    Ok(())
}
